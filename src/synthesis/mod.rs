//! # Synthesis Module
//!
//! Text-to-speech for the `/tts` endpoint and for spoken interview feedback.
//!
//! ## Key Components:
//! - **Synthesizers** (`synthesizer`): the `SpeechSynthesizer` capability and
//!   its providers (offline tone, remote OpenAI-compatible server, disabled)
//! - **Synthesis Adapter** (`adapter`): text validation, gated engine call,
//!   output verification and base64 transport encoding

pub mod adapter;
pub mod synthesizer;

pub use adapter::{SynthesisAdapter, SynthesisError, SynthesisOptions, SynthesisResult};
pub use synthesizer::build_synthesizer;
