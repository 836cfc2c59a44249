//! Test doubles and fixtures shared by the unit and HTTP tests.

use crate::audio::{encode_wav, AudioClip};
use crate::config::AppConfig;
use crate::engine::EngineError;
use crate::orchestrator::Orchestrator;
use crate::state::AppState;
use crate::synthesis::synthesizer::{SpeechRequest, SpeechSynthesizer, ToneSynthesizer};
use crate::synthesis::SynthesisAdapter;
use crate::transcription::recognizer::{Recognition, SpeechRecognizer};
use crate::transcription::TranscriptionAdapter;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BOUNDARY: &str = "interview-test-boundary";

/// Recognizer that returns a canned transcript.
pub struct FakeRecognizer {
    result: Result<Recognition, EngineError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl FakeRecognizer {
    pub fn text(text: &str) -> Self {
        Self {
            result: Ok(Recognition {
                text: text.to_string(),
                confidence: None,
            }),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(err: EngineError) -> Self {
        Self {
            result: Err(err),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_confidence(mut self, confidence: Option<f32>) -> Self {
        if let Ok(recognition) = &mut self.result {
            recognition.confidence = confidence;
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn recognize(&self, _clip: &AudioClip) -> Result<Recognition, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

enum SynthOutput {
    Tone,
    Bytes(Vec<u8>),
    Error(EngineError),
}

/// Synthesizer with scripted output.
pub struct FakeSynthesizer {
    output: SynthOutput,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl FakeSynthesizer {
    fn with_output(output: SynthOutput) -> Self {
        Self {
            output,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Real tone rendering at 16 kHz.
    pub fn tone() -> Self {
        Self::with_output(SynthOutput::Tone)
    }

    pub fn returning(bytes: Vec<u8>) -> Self {
        Self::with_output(SynthOutput::Bytes(bytes))
    }

    pub fn failing(err: EngineError) -> Self {
        Self::with_output(SynthOutput::Error(err))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.output {
            SynthOutput::Tone => ToneSynthesizer::new(16000).synthesize(request).await,
            SynthOutput::Bytes(bytes) => Ok(bytes.clone()),
            SynthOutput::Error(err) => Err(err.clone()),
        }
    }
}

/// 16 kHz mono WAV of a 440 Hz tone.
pub fn sine_wav(secs: f32) -> Vec<u8> {
    let rate = 16000;
    let len = (rate as f32 * secs) as usize;
    let samples = (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / rate as f32).sin() * 0.5)
        .collect();
    encode_wav(&AudioClip::new(samples, rate)).unwrap()
}

/// Build a `multipart/form-data` body. Parts with a filename are sent as WAV files.
pub fn multipart_body(parts: Vec<(&str, Option<&str>, Vec<u8>)>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: audio/wav\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub fn orchestrator_with(recognizer: FakeRecognizer, synthesizer: FakeSynthesizer) -> Orchestrator {
    Orchestrator::new(
        TranscriptionAdapter::new(Arc::new(recognizer), 1, 16000),
        SynthesisAdapter::new(Arc::new(synthesizer), 1),
    )
}

pub fn state_with(recognizer: FakeRecognizer, synthesizer: FakeSynthesizer) -> AppState {
    AppState::new(AppConfig::default(), orchestrator_with(recognizer, synthesizer))
}

pub fn test_state() -> AppState {
    state_with(
        FakeRecognizer::text("First I profiled the service. Then I fixed the slow query."),
        FakeSynthesizer::tone(),
    )
}

/// Initialise the full route table and middleware around `state`.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state))
                .wrap($crate::middleware::MetricsMiddleware)
                .wrap($crate::middleware::RequestCorrelation)
                .configure(|cfg| $crate::handlers::configure(cfg, 256 * 1024)),
        )
        .await
    };
}
pub(crate) use test_app;
