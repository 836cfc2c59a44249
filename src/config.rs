//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix, `__` between nested keys)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms)
//! 2. Environment variables (APP_SERVER__PORT, APP_SPEECH__SYNTHESIS_TIMEOUT_MS, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! ## Runtime updates:
//! `PUT /config` can change timeouts, request limits and evaluation defaults.
//! Engine providers are wired once at start-up and stay fixed for the process lifetime.

use crate::audio::AudioLimits;
use crate::evaluation::RequestLimits;
use crate::orchestrator::PipelineOptions;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Provider names accepted for the speech recognizer.
pub const RECOGNIZER_PROVIDERS: &[&str] = &["remote", "disabled"];

/// Provider names accepted for the speech synthesizer.
pub const SYNTHESIZER_PROVIDERS: &[&str] = &["tone", "remote", "disabled"];

/// Main application configuration, grouped by subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub speech: SpeechConfig,
    pub evaluation: EvaluationConfig,
    pub limits: LimitsConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address to bind to ("0.0.0.0" accepts connections from anywhere)
/// - `port`: TCP port number to listen on
/// - `workers`: Number of actix worker threads (0 = one per CPU core)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// Speech pipeline settings shared by transcription and synthesis.
///
/// ## Audio format:
/// Uploaded audio must be RIFF/WAV. It is decoded, mixed down to mono and
/// resampled to `sample_rate` before it reaches the recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Sample rate (Hz) audio is normalised to before recognition
    pub sample_rate: u32,

    /// Shortest accepted recording (seconds)
    pub min_audio_seconds: f64,

    /// Longest accepted recording (seconds)
    pub max_audio_seconds: f64,

    /// Peak amplitude (0.0 - 1.0) under which a recording counts as silence
    pub silence_threshold: f32,

    /// Upper bound for a single recognizer call, including the wait for the engine
    pub transcription_timeout_ms: u64,

    /// Upper bound for a single synthesizer call, including the wait for the engine
    pub synthesis_timeout_ms: u64,

    pub recognizer: EngineConfig,
    pub synthesizer: EngineConfig,
}

/// Settings for one external speech engine.
///
/// ## Providers:
/// - recognizer: `remote` (OpenAI-compatible transcription API) or `disabled`
/// - synthesizer: `tone` (offline), `remote` (OpenAI-compatible speech API) or `disabled`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub voice: Option<String>,
    pub language: Option<String>,
    pub api_key: Option<String>,

    /// How many calls may use the engine at once (1 = exclusive access)
    pub max_concurrent: usize,
}

/// Evaluation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Whether feedback is read back as audio when a request does not say
    pub speak_feedback_by_default: bool,
}

/// Size and shape limits enforced at the request boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
    pub max_json_bytes: usize,
    pub max_tts_chars: usize,
    pub max_candidate_chars: usize,
    pub max_question_id_chars: usize,
    pub max_metadata_entries: usize,
    pub max_metadata_key_chars: usize,
    pub max_metadata_value_bytes: usize,
    pub max_metadata_depth: usize,
}

/// Provides default configuration values.
///
/// With these defaults the synthesizer works offline; transcription expects an
/// OpenAI-compatible server on localhost and reports `engine_unavailable` otherwise.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8081,
                workers: 0,
            },
            speech: SpeechConfig {
                sample_rate: 16000,          // What most recognizers expect
                min_audio_seconds: 0.1,
                max_audio_seconds: 300.0,
                silence_threshold: 0.001,
                transcription_timeout_ms: 30_000,
                synthesis_timeout_ms: 15_000,
                recognizer: EngineConfig {
                    provider: "remote".to_string(),
                    base_url: "http://127.0.0.1:9000".to_string(),
                    model: "whisper-1".to_string(),
                    voice: None,
                    language: Some("en".to_string()),
                    api_key: None,
                    max_concurrent: 1,
                },
                synthesizer: EngineConfig {
                    provider: "tone".to_string(),
                    base_url: "http://127.0.0.1:9000".to_string(),
                    model: "tts-1".to_string(),
                    voice: Some("alloy".to_string()),
                    language: None,
                    api_key: None,
                    max_concurrent: 1,
                },
            },
            evaluation: EvaluationConfig {
                speak_feedback_by_default: false,
            },
            limits: LimitsConfig {
                max_upload_bytes: 25 * 1024 * 1024,
                max_json_bytes: 256 * 1024,
                max_tts_chars: 4000,
                max_candidate_chars: 20_000,
                max_question_id_chars: 128,
                max_metadata_entries: 32,
                max_metadata_key_chars: 64,
                max_metadata_value_bytes: 4096,
                max_metadata_depth: 4,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_SPEECH__RECOGNIZER__BASE_URL=http://whisper:8000`: Point at another recognizer
    /// - `APP_SPEECH__SYNTHESIZER__PROVIDER=remote`: Use the remote synthesizer
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Runs at start-up and again on every runtime update.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        let speech = &self.speech;
        if !(8000..=48000).contains(&speech.sample_rate) {
            return Err(anyhow!(
                "Sample rate must be between 8000 and 48000 Hz, got {}",
                speech.sample_rate
            ));
        }

        if speech.min_audio_seconds < 0.0 || speech.max_audio_seconds <= speech.min_audio_seconds {
            return Err(anyhow!(
                "Audio duration bounds are invalid: min {}s, max {}s",
                speech.min_audio_seconds,
                speech.max_audio_seconds
            ));
        }

        if !(0.0..1.0).contains(&speech.silence_threshold) {
            return Err(anyhow!("Silence threshold must be in [0, 1)"));
        }

        if speech.transcription_timeout_ms == 0 || speech.synthesis_timeout_ms == 0 {
            return Err(anyhow!("Engine timeouts must be greater than 0"));
        }

        validate_engine("recognizer", &speech.recognizer, RECOGNIZER_PROVIDERS)?;
        validate_engine("synthesizer", &speech.synthesizer, SYNTHESIZER_PROVIDERS)?;

        let limits = &self.limits;
        let limit_values = [
            ("max_upload_bytes", limits.max_upload_bytes),
            ("max_json_bytes", limits.max_json_bytes),
            ("max_tts_chars", limits.max_tts_chars),
            ("max_candidate_chars", limits.max_candidate_chars),
            ("max_question_id_chars", limits.max_question_id_chars),
            ("max_metadata_key_chars", limits.max_metadata_key_chars),
            ("max_metadata_value_bytes", limits.max_metadata_value_bytes),
            ("max_metadata_depth", limits.max_metadata_depth),
        ];
        if let Some((name, _)) = limit_values.iter().find(|(_, value)| *value == 0) {
            return Err(anyhow!("Limit {} must be greater than 0", name));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// Only the fields present in the JSON are changed. For example
    /// `{"speech": {"synthesis_timeout_ms": 5000}}` changes just that timeout.
    /// Server binding and engine providers are ignored here: they only take
    /// effect at start-up.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(speech) = partial_config.get("speech") {
            if let Some(ms) = speech.get("transcription_timeout_ms").and_then(|v| v.as_u64()) {
                self.speech.transcription_timeout_ms = ms;
            }
            if let Some(ms) = speech.get("synthesis_timeout_ms").and_then(|v| v.as_u64()) {
                self.speech.synthesis_timeout_ms = ms;
            }
            if let Some(secs) = speech.get("min_audio_seconds").and_then(|v| v.as_f64()) {
                self.speech.min_audio_seconds = secs;
            }
            if let Some(secs) = speech.get("max_audio_seconds").and_then(|v| v.as_f64()) {
                self.speech.max_audio_seconds = secs;
            }
            if let Some(threshold) = speech.get("silence_threshold").and_then(|v| v.as_f64()) {
                self.speech.silence_threshold = threshold as f32;
            }
        }

        if let Some(evaluation) = partial_config.get("evaluation") {
            if let Some(speak) = evaluation.get("speak_feedback_by_default").and_then(|v| v.as_bool()) {
                self.evaluation.speak_feedback_by_default = speak;
            }
        }

        if let Some(limits) = partial_config.get("limits") {
            let fields: [(&str, &mut usize); 9] = [
                ("max_upload_bytes", &mut self.limits.max_upload_bytes),
                ("max_json_bytes", &mut self.limits.max_json_bytes),
                ("max_tts_chars", &mut self.limits.max_tts_chars),
                ("max_candidate_chars", &mut self.limits.max_candidate_chars),
                ("max_question_id_chars", &mut self.limits.max_question_id_chars),
                ("max_metadata_entries", &mut self.limits.max_metadata_entries),
                ("max_metadata_key_chars", &mut self.limits.max_metadata_key_chars),
                ("max_metadata_value_bytes", &mut self.limits.max_metadata_value_bytes),
                ("max_metadata_depth", &mut self.limits.max_metadata_depth),
            ];
            for (name, slot) in fields {
                if let Some(value) = limits.get(name).and_then(|v| v.as_u64()) {
                    *slot = value as usize;
                }
            }
        }

        self.validate()?;
        Ok(())
    }

    /// Per-request knobs handed to the orchestrator.
    ///
    /// Read fresh for every request so runtime config updates apply immediately.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            transcription_timeout: Duration::from_millis(self.speech.transcription_timeout_ms),
            synthesis_timeout: Duration::from_millis(self.speech.synthesis_timeout_ms),
            audio: self.speech.audio_limits(),
            request: self.limits.request_limits(),
            max_tts_chars: self.limits.max_tts_chars,
            speak_feedback_by_default: self.evaluation.speak_feedback_by_default,
        }
    }
}

impl SpeechConfig {
    pub fn audio_limits(&self) -> AudioLimits {
        AudioLimits {
            min_duration_secs: self.min_audio_seconds,
            max_duration_secs: self.max_audio_seconds,
            silence_threshold: self.silence_threshold,
        }
    }
}

impl LimitsConfig {
    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_candidate_chars: self.max_candidate_chars,
            max_question_id_chars: self.max_question_id_chars,
            max_metadata_entries: self.max_metadata_entries,
            max_metadata_key_chars: self.max_metadata_key_chars,
            max_metadata_value_bytes: self.max_metadata_value_bytes,
            max_metadata_depth: self.max_metadata_depth,
        }
    }
}

fn validate_engine(role: &str, engine: &EngineConfig, providers: &[&str]) -> Result<()> {
    if !providers.contains(&engine.provider.as_str()) {
        return Err(anyhow!(
            "Unknown {} provider '{}' (expected one of: {})",
            role,
            engine.provider,
            providers.join(", ")
        ));
    }

    if engine.max_concurrent == 0 {
        return Err(anyhow!("{} max_concurrent must be greater than 0", role));
    }

    if engine.provider == "remote"
        && !(engine.base_url.starts_with("http://") || engine.base_url.starts_with("https://"))
    {
        return Err(anyhow!(
            "{} base_url must be an http(s) URL, got '{}'",
            role,
            engine.base_url
        ));
    }

    Ok(())
}
