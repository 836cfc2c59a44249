//! # Request Orchestrator
//!
//! Sequences the speech adapters and the evaluation engine for each endpoint
//! and translates their errors into `AppError`.
//!
//! ## Pipelines:
//! - **speech_to_text**: one transcription
//! - **text_to_speech**: one synthesis
//! - **evaluate_answer**: one evaluation, then one synthesis of the feedback
//!   when it should be spoken
//! - **evaluate_spoken_answer**: transcription, evaluation, optional synthesis
//!
//! Nothing is swallowed: if speaking the feedback fails, the request fails.

use crate::audio::AudioLimits;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::evaluation::{CriterionScore, EvaluationEngine, InterviewRequest, Metadata, RequestLimits};
use crate::synthesis::{build_synthesizer, SynthesisAdapter, SynthesisOptions, SynthesisResult};
use crate::transcription::{build_recognizer, TranscriptionAdapter, TranscriptionResult};
use serde::Serialize;
use std::time::Duration;

/// Per-request settings, snapshotted from the runtime config.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub transcription_timeout: Duration,
    pub synthesis_timeout: Duration,
    pub audio: AudioLimits,
    pub request: RequestLimits,
    pub max_tts_chars: usize,
    pub speak_feedback_by_default: bool,
}

impl PipelineOptions {
    fn synthesis(&self, voice: Option<String>) -> SynthesisOptions {
        SynthesisOptions {
            timeout: self.synthesis_timeout,
            max_chars: self.max_tts_chars,
            voice,
        }
    }
}

/// Response body of `/interview`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewFeedback {
    #[serde(rename = "feedbackText")]
    pub feedback_text: String,
    pub score: u32,
    pub audio_base64: Option<String>,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub breakdown: Vec<CriterionScore>,
}

/// Response body of `/interview/audio`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpokenInterviewFeedback {
    #[serde(flatten)]
    pub feedback: InterviewFeedback,
    pub transcription: TranscriptionResult,
}

/// A recorded answer plus the fields of an `InterviewRequest`.
#[derive(Debug, Clone, Default)]
pub struct SpokenAnswer {
    pub audio: Vec<u8>,
    pub question_id: Option<String>,
    pub metadata: Metadata,
    pub speak_feedback: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub provider: String,
    pub capacity: usize,
    pub available: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnginesStatus {
    pub recognizer: EngineStatus,
    pub synthesizer: EngineStatus,
}

pub struct Orchestrator {
    transcription: TranscriptionAdapter,
    synthesis: SynthesisAdapter,
    evaluation: EvaluationEngine,
}

impl Orchestrator {
    pub fn new(transcription: TranscriptionAdapter, synthesis: SynthesisAdapter) -> Self {
        Self {
            transcription,
            synthesis,
            evaluation: EvaluationEngine::new(),
        }
    }

    /// Construct both engines from the start-up configuration.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let speech = &config.speech;
        let recognizer = build_recognizer(&speech.recognizer)?;
        let synthesizer = build_synthesizer(&speech.synthesizer)?;

        Ok(Self::new(
            TranscriptionAdapter::new(recognizer, speech.recognizer.max_concurrent, speech.sample_rate),
            SynthesisAdapter::new(synthesizer, speech.synthesizer.max_concurrent),
        ))
    }

    pub fn engines(&self) -> EnginesStatus {
        EnginesStatus {
            recognizer: EngineStatus {
                provider: self.transcription.engine_name().to_string(),
                capacity: self.transcription.gate().capacity(),
                available: self.transcription.gate().available(),
            },
            synthesizer: EngineStatus {
                provider: self.synthesis.engine_name().to_string(),
                capacity: self.synthesis.gate().capacity(),
                available: self.synthesis.gate().available(),
            },
        }
    }

    /// Stop admitting engine calls; in-flight calls finish.
    pub fn shutdown(&self) {
        self.transcription.gate().close();
        self.synthesis.gate().close();
    }

    pub async fn speech_to_text(
        &self,
        audio: &[u8],
        options: &PipelineOptions,
    ) -> AppResult<TranscriptionResult> {
        Ok(self
            .transcription
            .transcribe(audio, options.transcription_timeout, &options.audio)
            .await?)
    }

    pub async fn text_to_speech(
        &self,
        text: &str,
        voice: Option<String>,
        options: &PipelineOptions,
    ) -> AppResult<SynthesisResult> {
        Ok(self.synthesis.synthesize(text, &options.synthesis(voice)).await?)
    }

    pub async fn evaluate_answer(
        &self,
        request: &InterviewRequest,
        request_id: &str,
        options: &PipelineOptions,
    ) -> AppResult<InterviewFeedback> {
        let evaluation = self.evaluation.evaluate(request, &options.request)?;

        let speak = request
            .speak_feedback
            .unwrap_or(options.speak_feedback_by_default);
        let audio_base64 = if speak {
            let spoken = self
                .text_to_speech(&evaluation.feedback_text, None, options)
                .await?;
            Some(spoken.audio_base64)
        } else {
            None
        };

        tracing::info!(
            request_id,
            score = evaluation.score,
            spoken = speak,
            "Interview answer evaluated"
        );

        Ok(InterviewFeedback {
            feedback_text: evaluation.feedback_text,
            score: evaluation.score,
            audio_base64,
            request_id: request_id.to_string(),
            breakdown: evaluation.breakdown,
        })
    }

    pub async fn evaluate_spoken_answer(
        &self,
        answer: SpokenAnswer,
        request_id: &str,
        options: &PipelineOptions,
    ) -> AppResult<SpokenInterviewFeedback> {
        let transcription = self.speech_to_text(&answer.audio, options).await?;
        if transcription.text.is_empty() {
            return Err(AppError::UnreadableAudio(
                "no speech was recognised in the recording".to_string(),
            ));
        }

        let request = InterviewRequest {
            question_id: answer.question_id,
            candidate_text: transcription.text.clone(),
            metadata: answer.metadata,
            speak_feedback: answer.speak_feedback,
        };
        let feedback = self.evaluate_answer(&request, request_id, options).await?;

        Ok(SpokenInterviewFeedback {
            feedback,
            transcription,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::testing::{orchestrator_with, sine_wav, FakeRecognizer, FakeSynthesizer};
    use actix_web::ResponseError;
    use serde_json::json;

    fn options() -> PipelineOptions {
        AppConfig::default().pipeline_options()
    }

    fn request(value: serde_json::Value) -> InterviewRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_feedback_is_not_spoken_by_default() {
        let synthesizer = FakeSynthesizer::tone();
        let calls = synthesizer.calls();
        let orchestrator = orchestrator_with(FakeRecognizer::text("unused"), synthesizer);

        let feedback = orchestrator
            .evaluate_answer(&request(json!({"candidateText": "I wrote tests."})), "req-1", &options())
            .await
            .unwrap();

        assert_eq!(feedback.audio_base64, None);
        assert_eq!(feedback.request_id, "req-1");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spoken_feedback_synthesizes_feedback_text() {
        let orchestrator = orchestrator_with(FakeRecognizer::text("unused"), FakeSynthesizer::tone());
        let feedback = orchestrator
            .evaluate_answer(
                &request(json!({"candidateText": "I wrote tests.", "speakFeedback": true})),
                "req-2",
                &options(),
            )
            .await
            .unwrap();
        assert!(feedback.audio_base64.is_some());
    }

    #[tokio::test]
    async fn test_synthesis_failure_fails_the_request() {
        let orchestrator = orchestrator_with(
            FakeRecognizer::text("unused"),
            FakeSynthesizer::failing(EngineError::Unavailable("no voice".into())),
        );
        let err = orchestrator
            .evaluate_answer(
                &request(json!({"candidateText": "I wrote tests.", "speakFeedback": true})),
                "req-3",
                &options(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "engine_unavailable");
    }

    #[tokio::test]
    async fn test_spoken_answer_pipeline() {
        let orchestrator = orchestrator_with(
            FakeRecognizer::text("First I measured. Then I fixed the slow query."),
            FakeSynthesizer::tone(),
        );
        let answer = SpokenAnswer {
            audio: sine_wav(1.0),
            question_id: Some("q-9".to_string()),
            ..SpokenAnswer::default()
        };

        let result = orchestrator
            .evaluate_spoken_answer(answer, "req-4", &options())
            .await
            .unwrap();
        assert_eq!(result.transcription.text, "First I measured. Then I fixed the slow query.");
        assert!(result.feedback.score <= 100);

        let body = serde_json::to_value(&result).unwrap();
        assert!(body["feedbackText"].is_string());
        assert_eq!(body["requestId"], "req-4");
        assert!(body["transcription"]["confidence"].is_number());
    }

    #[tokio::test]
    async fn test_silent_transcript_is_not_evaluated() {
        let orchestrator = orchestrator_with(FakeRecognizer::text("   "), FakeSynthesizer::tone());
        let answer = SpokenAnswer {
            audio: sine_wav(1.0),
            ..SpokenAnswer::default()
        };
        let err = orchestrator
            .evaluate_spoken_answer(answer, "req-5", &options())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_engines_report_gate_capacity() {
        let orchestrator = orchestrator_with(FakeRecognizer::text("x"), FakeSynthesizer::tone());
        let engines = orchestrator.engines();
        assert_eq!(engines.recognizer.provider, "fake");
        assert_eq!(engines.synthesizer.capacity, 1);
        assert_eq!(engines.synthesizer.available, 1);

        orchestrator.shutdown();
    }
}
