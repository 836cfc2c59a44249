//! # Transcription Module
//!
//! Speech-to-text for uploaded answers.
//!
//! ## Key Components:
//! - **Recognizers** (`recognizer`): the `SpeechRecognizer` capability and its
//!   providers (remote OpenAI-compatible server, disabled)
//! - **Transcription Adapter** (`adapter`): decoding, validation, gated engine
//!   call and confidence scoring
//!
//! The recognizer is constructed once at start-up and injected; nothing in
//! this module holds global state.

pub mod adapter;
pub mod recognizer;

pub use adapter::{TranscriptionAdapter, TranscriptionError, TranscriptionResult};
pub use recognizer::build_recognizer;
