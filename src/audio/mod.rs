//! # Audio Processing Module
//!
//! Decoding, validation and encoding of the audio that flows through the
//! speech pipeline.
//!
//! ## Key Components:
//! - **WAV codec** (`wav`): RIFF/WAV bytes ⇄ normalised sample buffers
//! - **Audio Processor** (`processor`): duration/silence checks, DC-offset
//!   removal, peak normalisation, PCM conversion
//!
//! ## Accepted upload format:
//! - **Container**: RIFF/WAV
//! - **Samples**: 8/16/24/32-bit integer PCM or 32-bit float
//! - **Channels / rate**: anything; mixed down to mono and resampled to the
//!   configured rate (16 kHz by default)
//!
//! ## Produced format:
//! 16-bit little-endian PCM, mono, WAV container.

pub mod processor;
pub mod wav;

pub use processor::{AudioLimits, AudioProcessor};
pub use wav::{decode_wav, encode_wav, inspect_wav};

use std::fmt;

/// A mono buffer of `f32` samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Problems with an audio payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No bytes, or a container with zero samples
    Empty,
    /// Bytes are not a RIFF/WAVE container
    NotWav(String),
    /// WAV header was recognised but decoding failed
    Decode(String),
    /// Valid WAV with a sample layout we do not handle
    UnsupportedFormat(String),
    TooShort { duration_secs: f64, min_secs: f64 },
    TooLong { duration_secs: f64, max_secs: f64 },
    Silent { peak: f32 },
    Encode(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Empty => write!(f, "audio contains no samples"),
            AudioError::NotWav(msg) => write!(f, "audio is not a WAV file: {}", msg),
            AudioError::Decode(msg) => write!(f, "WAV decode error: {}", msg),
            AudioError::UnsupportedFormat(msg) => write!(f, "unsupported WAV format: {}", msg),
            AudioError::TooShort { duration_secs, min_secs } => write!(
                f,
                "audio too short: {:.2}s (minimum: {:.2}s)",
                duration_secs, min_secs
            ),
            AudioError::TooLong { duration_secs, max_secs } => write!(
                f,
                "audio too long: {:.2}s (maximum: {:.2}s)",
                duration_secs, max_secs
            ),
            AudioError::Silent { peak } => write!(f, "audio is silent (peak amplitude {:.5})", peak),
            AudioError::Encode(msg) => write!(f, "WAV encode error: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::Unsupported => {
                AudioError::UnsupportedFormat("sample layout not supported".to_string())
            }
            other => AudioError::Decode(other.to_string()),
        }
    }
}
