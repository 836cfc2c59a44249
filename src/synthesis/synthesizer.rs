//! # Speech Synthesizers
//!
//! The pluggable text-to-speech capability behind the synthesis adapter.
//!
//! ## Providers:
//! - **tone**: offline and deterministic. Renders one tone burst per word so
//!   the service produces real, playable WAV audio without any model or
//!   network dependency. Pitch follows the word's characters, length follows
//!   its size, punctuation adds a pause.
//! - **remote**: any server speaking the OpenAI speech API
//!   (`POST /v1/audio/speech`)
//! - **disabled**: refuses every call with `EngineUnavailable`

use crate::audio::{encode_wav, AudioClip};
use crate::config::EngineConfig;
use crate::engine::{status_error, transport_error, EngineError};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Output rate of the tone synthesizer.
pub const TONE_SAMPLE_RATE: u32 = 22050;

/// Text to speak plus an optional voice hint.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<String>,
}

/// Text-to-speech capability. Implementations return a complete WAV file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, EngineError>;
}

/// Build the synthesizer named by `config.provider`.
pub fn build_synthesizer(config: &EngineConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
    tracing::info!("Initializing speech synthesizer: {}", config.provider);

    match config.provider.as_str() {
        "tone" => Ok(Arc::new(ToneSynthesizer::new(TONE_SAMPLE_RATE))),
        "remote" => Ok(Arc::new(RemoteSynthesizer::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledSynthesizer)),
        other => Err(anyhow!("Unknown synthesizer provider: {}", other)),
    }
}

/// Offline tone-sequence synthesizer.
pub struct ToneSynthesizer {
    sample_rate: u32,
}

impl ToneSynthesizer {
    const AMPLITUDE: f32 = 0.3;
    const ENVELOPE_MS: u32 = 20;
    const WORD_GAP_MS: u32 = 40;
    const PUNCTUATION_PAUSE_MS: u32 = 150;

    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    fn samples_for(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize
    }

    /// Render `text` into mono samples. Always produces at least one tone.
    pub fn render(&self, text: &str) -> Vec<f32> {
        let mut samples = Vec::new();

        for word in text.split_whitespace() {
            let letters: Vec<char> = word.chars().filter(|c| c.is_alphanumeric()).collect();
            if !letters.is_empty() {
                let code_sum: u32 = letters.iter().map(|&c| c as u32).sum();
                let frequency = 180.0 + (code_sum % 24) as f32 * 15.0;
                let duration_ms = 60 + 35 * letters.len().min(12) as u32;
                self.push_tone(&mut samples, frequency, duration_ms);
                self.push_silence(&mut samples, Self::WORD_GAP_MS);
            }

            if word.ends_with(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?')) {
                self.push_silence(&mut samples, Self::PUNCTUATION_PAUSE_MS);
            }
        }

        if samples.iter().all(|s| *s == 0.0) {
            samples.clear();
            self.push_tone(&mut samples, 220.0, 120);
        }

        samples
    }

    fn push_tone(&self, samples: &mut Vec<f32>, frequency: f32, duration_ms: u32) {
        let len = self.samples_for(duration_ms);
        let ramp = self.samples_for(Self::ENVELOPE_MS).clamp(1, (len / 2).max(1));
        let rate = self.sample_rate as f32;

        samples.extend((0..len).map(|i| {
            let envelope = if i < ramp {
                i as f32 / ramp as f32
            } else if i >= len - ramp {
                (len - i) as f32 / ramp as f32
            } else {
                1.0
            };
            let phase = 2.0 * std::f32::consts::PI * frequency * i as f32 / rate;
            phase.sin() * Self::AMPLITUDE * envelope
        }));
    }

    fn push_silence(&self, samples: &mut Vec<f32>, duration_ms: u32) {
        let len = self.samples_for(duration_ms);
        samples.extend(std::iter::repeat(0.0).take(len));
    }
}

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    fn name(&self) -> &str {
        "tone"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, EngineError> {
        let text = request.text.clone();
        let synthesizer = ToneSynthesizer::new(self.sample_rate);

        tokio::task::spawn_blocking(move || {
            let clip = AudioClip::new(synthesizer.render(&text), synthesizer.sample_rate);
            encode_wav(&clip)
        })
        .await
        .map_err(|e| EngineError::Failed(format!("tone synthesis task failed: {}", e)))?
        .map_err(|e| EngineError::Failed(e.to_string()))
    }
}

/// Client for an OpenAI-compatible speech endpoint.
pub struct RemoteSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    voice: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechPayload<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

impl RemoteSynthesizer {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/audio/speech", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            voice: config.voice.clone().unwrap_or_else(|| "alloy".to_string()),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for RemoteSynthesizer {
    fn name(&self) -> &str {
        "remote"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, EngineError> {
        let payload = SpeechPayload {
            model: &self.model,
            input: &request.text,
            voice: request.voice.as_deref().unwrap_or(&self.voice),
            response_format: "wav",
        };

        let mut http = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            chars = request.text.chars().count(),
            "Sending text to remote synthesizer"
        );

        let response = http
            .send()
            .await
            .map_err(|e| transport_error("synthesizer", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("synthesizer", status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("synthesizer", e))?;
        Ok(bytes.to_vec())
    }
}

pub struct DisabledSynthesizer;

#[async_trait]
impl SpeechSynthesizer for DisabledSynthesizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn synthesize(&self, _request: &SpeechRequest) -> Result<Vec<u8>, EngineError> {
        Err(EngineError::Unavailable(
            "speech synthesis is disabled in this deployment".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::inspect_wav;
    use crate::config::AppConfig;

    fn request(text: &str) -> SpeechRequest {
        SpeechRequest {
            text: text.to_string(),
            voice: None,
        }
    }

    #[test]
    fn test_tone_render_is_deterministic() {
        let synthesizer = ToneSynthesizer::new(TONE_SAMPLE_RATE);
        assert_eq!(synthesizer.render("Tell me more."), synthesizer.render("Tell me more."));
        assert_ne!(synthesizer.render("Tell me more."), synthesizer.render("Tell me less."));
    }

    #[test]
    fn test_tone_render_scales_with_words() {
        let synthesizer = ToneSynthesizer::new(TONE_SAMPLE_RATE);
        let one = synthesizer.render("Good");
        let three = synthesizer.render("Good clear answer");
        assert!(three.len() > one.len());
        assert!(one.iter().all(|s| s.abs() <= ToneSynthesizer::AMPLITUDE + 1e-6));
    }

    #[test]
    fn test_punctuation_only_text_still_renders_audio() {
        let synthesizer = ToneSynthesizer::new(TONE_SAMPLE_RATE);
        let samples = synthesizer.render("?!");
        assert!(!samples.is_empty());
        assert!(samples.iter().any(|s| *s != 0.0));
    }

    #[tokio::test]
    async fn test_tone_synthesizer_produces_wav() {
        let synthesizer = ToneSynthesizer::new(TONE_SAMPLE_RATE);
        let bytes = synthesizer.synthesize(&request("Hello candidate")).await.unwrap();
        let summary = inspect_wav(&bytes).unwrap();

        assert_eq!(summary.sample_rate, TONE_SAMPLE_RATE);
        assert_eq!(summary.channels, 1);
        assert!(summary.frames > 0);
    }

    #[test]
    fn test_build_synthesizer_by_provider() {
        let mut config = AppConfig::default().speech.synthesizer;
        assert_eq!(build_synthesizer(&config).unwrap().name(), "tone");

        config.provider = "remote".to_string();
        assert_eq!(build_synthesizer(&config).unwrap().name(), "remote");

        config.provider = "espeak".to_string();
        assert!(build_synthesizer(&config).is_err());
    }

    #[tokio::test]
    async fn test_disabled_synthesizer_is_unavailable() {
        let result = DisabledSynthesizer.synthesize(&request("hi")).await;
        assert!(matches!(result, Err(EngineError::Unavailable(_))));
    }
}
