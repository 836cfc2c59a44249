//! # Speech Recognizers
//!
//! The pluggable speech-to-text capability behind the transcription adapter.
//!
//! ## Providers:
//! - **remote**: any server speaking the OpenAI transcription API
//!   (`POST /v1/audio/transcriptions`), e.g. a self-hosted Whisper server
//! - **disabled**: refuses every call with `EngineUnavailable`

use crate::audio::{encode_wav, AudioClip};
use crate::config::EngineConfig;
use crate::engine::{status_error, transport_error, EngineError};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Raw output of a recognizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// Engine-reported confidence, if the engine provides one
    pub confidence: Option<f32>,
}

/// Speech-to-text capability.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Short provider name for logs and health output
    fn name(&self) -> &str;

    /// Recognise speech in a mono clip.
    async fn recognize(&self, clip: &AudioClip) -> Result<Recognition, EngineError>;
}

/// Build the recognizer named by `config.provider`.
pub fn build_recognizer(config: &EngineConfig) -> Result<Arc<dyn SpeechRecognizer>> {
    tracing::info!("Initializing speech recognizer: {}", config.provider);

    match config.provider.as_str() {
        "remote" => Ok(Arc::new(RemoteRecognizer::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledRecognizer)),
        other => Err(anyhow!("Unknown recognizer provider: {}", other)),
    }
}

/// Client for an OpenAI-compatible transcription endpoint.
pub struct RemoteRecognizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    language: Option<String>,
    api_key: Option<String>,
}

/// `verbose_json` response body; only the fields we use.
#[derive(Debug, Deserialize)]
struct TranscriptionPayload {
    text: String,
    #[serde(default)]
    segments: Vec<SegmentPayload>,
}

#[derive(Debug, Deserialize)]
struct SegmentPayload {
    #[serde(default)]
    avg_logprob: Option<f64>,
}

impl TranscriptionPayload {
    /// exp(mean segment log-probability), when segments carry one.
    fn confidence(&self) -> Option<f32> {
        let logprobs: Vec<f64> = self.segments.iter().filter_map(|s| s.avg_logprob).collect();
        if logprobs.is_empty() {
            return None;
        }
        let mean = logprobs.iter().sum::<f64>() / logprobs.len() as f64;
        Some(mean.exp().clamp(0.0, 1.0) as f32)
    }
}

impl RemoteRecognizer {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/audio/transcriptions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            language: config.language.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SpeechRecognizer for RemoteRecognizer {
    fn name(&self) -> &str {
        "remote"
    }

    async fn recognize(&self, clip: &AudioClip) -> Result<Recognition, EngineError> {
        let wav = encode_wav(clip).map_err(|e| EngineError::Failed(e.to_string()))?;

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("answer.wav")
            .mime_str("audio/wav")
            .map_err(|e| EngineError::Failed(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            duration_secs = clip.duration_secs(),
            "Sending audio to remote recognizer"
        );

        let response = request
            .send()
            .await
            .map_err(|e| transport_error("recognizer", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("recognizer", status, &body));
        }

        let payload: TranscriptionPayload = response
            .json()
            .await
            .map_err(|e| EngineError::Failed(format!("invalid recognizer response: {}", e)))?;

        Ok(Recognition {
            confidence: payload.confidence(),
            text: payload.text,
        })
    }
}

/// Recognizer used when speech recognition is switched off.
pub struct DisabledRecognizer;

#[async_trait]
impl SpeechRecognizer for DisabledRecognizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn recognize(&self, _clip: &AudioClip) -> Result<Recognition, EngineError> {
        Err(EngineError::Unavailable(
            "speech recognition is disabled in this deployment".to_string(),
        ))
    }
}
