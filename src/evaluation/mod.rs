//! # Evaluation Module
//!
//! Rubric scoring of interview answers.
//!
//! ## Key Components:
//! - **Requests** (`request`): the `InterviewRequest` contract, metadata
//!   limits and known-key checks
//! - **Rubric** (`rubric`): text statistics and per-criterion scoring
//! - **Evaluation Engine** (`engine`): weighted score plus feedback text

pub mod engine;
pub mod request;
pub mod rubric;

pub use engine::{CriterionScore, EvaluationEngine};
pub use request::{EvaluationError, InterviewRequest, Metadata, RequestLimits};
