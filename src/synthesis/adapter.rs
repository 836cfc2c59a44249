//! Synthesis adapter: validated text in, verified base64 WAV out.

use super::synthesizer::{SpeechRequest, SpeechSynthesizer};
use crate::audio::inspect_wav;
use crate::engine::{EngineError, EngineGate};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a synthesis operation, serialised as the `/tts` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisResult {
    /// Base64 (standard alphabet) WAV file
    pub audio_base64: String,
    pub format: &'static str,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub engine: String,
}

/// Per-call knobs.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub timeout: Duration,
    pub max_chars: usize,
    pub voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisError {
    EmptyText,
    TextTooLong { len: usize, max: usize },
    /// The engine answered with something that is not a usable WAV
    InvalidAudio(String),
    Engine(EngineError),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::EmptyText => write!(f, "text to synthesize must not be empty"),
            SynthesisError::TextTooLong { len, max } => write!(
                f,
                "text to synthesize is {} characters (maximum: {})",
                len, max
            ),
            SynthesisError::InvalidAudio(msg) => write!(f, "synthesized audio is invalid: {}", msg),
            SynthesisError::Engine(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SynthesisError {}

impl From<EngineError> for SynthesisError {
    fn from(err: EngineError) -> Self {
        SynthesisError::Engine(err)
    }
}

/// Text-to-speech front end for one synthesizer.
pub struct SynthesisAdapter {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    gate: EngineGate,
}

impl SynthesisAdapter {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, max_concurrent: usize) -> Self {
        Self {
            gate: EngineGate::new("synthesizer", max_concurrent),
            synthesizer,
        }
    }

    pub fn engine_name(&self) -> &str {
        self.synthesizer.name()
    }

    pub fn gate(&self) -> &EngineGate {
        &self.gate
    }

    /// Synthesize `text` and verify the engine's output before returning it.
    pub async fn synthesize(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<SynthesisResult, SynthesisError> {
        let start_time = Instant::now();

        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let len = text.chars().count();
        if len > options.max_chars {
            return Err(SynthesisError::TextTooLong {
                len,
                max: options.max_chars,
            });
        }

        let request = SpeechRequest {
            text: text.to_string(),
            voice: options.voice.clone(),
        };
        let wav = self
            .gate
            .run(options.timeout, self.synthesizer.synthesize(&request))
            .await?;

        let summary = inspect_wav(&wav).map_err(|e| SynthesisError::InvalidAudio(e.to_string()))?;
        if summary.frames == 0 {
            return Err(SynthesisError::InvalidAudio("WAV contains no samples".to_string()));
        }

        tracing::info!(
            engine = self.synthesizer.name(),
            chars = len,
            audio_secs = summary.duration_secs(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Synthesis completed"
        );

        Ok(SynthesisResult {
            audio_base64: STANDARD.encode(&wav),
            format: "wav",
            sample_rate: summary.sample_rate,
            duration_seconds: summary.duration_secs(),
            engine: self.synthesizer.name().to_string(),
        })
    }
}
