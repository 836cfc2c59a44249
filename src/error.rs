//! # Error Handling
//!
//! This module defines the HTTP-facing error type and how each internal failure
//! is translated into a status code and a structured JSON body.
//!
//! ## Layers:
//! - Adapters and the evaluation engine return their own typed errors
//!   (`TranscriptionError`, `SynthesisError`, `EvaluationError`).
//! - The `From` impls below are the single place where those become `AppError`.
//! - `AppError` implements actix's `ResponseError`, so handlers just use `?`.
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "error": {
//!     "type": "validation_error",
//!     "message": "candidateText must not be empty",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```

use crate::engine::EngineError;
use crate::evaluation::EvaluationError;
use crate::synthesis::SynthesisError;
use crate::transcription::TranscriptionError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **ValidationError**: Malformed or missing request fields (400)
/// - **UnreadableAudio**: The uploaded recording cannot be transcribed as sent (400)
/// - **TranscriptionError**: The recognizer failed (502)
/// - **SynthesisError**: The synthesizer failed or produced unusable audio (502)
/// - **EngineUnavailable**: An external engine could not be reached (503)
/// - **Timeout**: An engine call ran past its deadline (504)
/// - **Deprecated**: The route was retired in favour of another (410)
/// - **PayloadTooLarge**: Upload exceeded the configured size (413)
/// - **Internal / ConfigError**: Server-side problems (500)
#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    ConfigError(String),
    ValidationError(String),
    UnreadableAudio(String),
    TranscriptionError(String),
    SynthesisError(String),
    EngineUnavailable(String),
    Timeout(String),
    Deprecated(String),
    PayloadTooLarge(String),
}

impl AppError {
    /// Machine-readable error type used in the JSON body.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::ConfigError(_) => "config_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::UnreadableAudio(_) | AppError::TranscriptionError(_) => "transcription_error",
            AppError::SynthesisError(_) => "synthesis_error",
            AppError::EngineUnavailable(_) => "engine_unavailable",
            AppError::Timeout(_) => "timeout",
            AppError::Deprecated(_) => "deprecated",
            AppError::PayloadTooLarge(_) => "payload_too_large",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ConfigError(msg)
            | AppError::ValidationError(msg)
            | AppError::UnreadableAudio(msg)
            | AppError::TranscriptionError(msg)
            | AppError::SynthesisError(msg)
            | AppError::EngineUnavailable(msg)
            | AppError::Timeout(msg)
            | AppError::Deprecated(msg)
            | AppError::PayloadTooLarge(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::UnreadableAudio(msg) => write!(f, "Unreadable audio: {}", msg),
            AppError::TranscriptionError(msg) => write!(f, "Transcription error: {}", msg),
            AppError::SynthesisError(msg) => write!(f, "Synthesis error: {}", msg),
            AppError::EngineUnavailable(msg) => write!(f, "Engine unavailable: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            AppError::Deprecated(msg) => write!(f, "Deprecated: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
        }
    }
}

/// Converts errors into HTTP responses.
///
/// ## HTTP Status Code Mapping:
/// - ValidationError/BadRequest/UnreadableAudio → 400
/// - NotFound → 404
/// - Deprecated → 410
/// - PayloadTooLarge → 413
/// - Internal/ConfigError → 500
/// - TranscriptionError/SynthesisError → 502
/// - EngineUnavailable → 503
/// - Timeout → 504
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) | AppError::UnreadableAudio(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Deprecated(_) => StatusCode::GONE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::TranscriptionError(_) | AppError::SynthesisError(_) => StatusCode::BAD_GATEWAY,
            AppError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error_type = self.error_type(), status = status.as_u16(), "{}", self);
        } else {
            tracing::warn!(error_type = self.error_type(), status = status.as_u16(), "{}", self);
        }

        HttpResponse::build(status).json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always the client's fault, so they become 400s.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Engine failures that are not tied to a specific adapter.
///
/// `Failed` has no adapter context here, so it maps to a generic 500; the
/// adapter-specific conversions below give it a 502 with the right type.
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => AppError::EngineUnavailable(msg),
            EngineError::Timeout(after) => {
                AppError::Timeout(format!("engine did not answer within {} ms", after.as_millis()))
            }
            EngineError::Failed(msg) => AppError::Internal(msg),
        }
    }
}

impl From<TranscriptionError> for AppError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::Engine(EngineError::Failed(msg)) => {
                AppError::TranscriptionError(format!("speech recognition failed: {}", msg))
            }
            TranscriptionError::Engine(engine_err) => engine_err.into(),
            _ => AppError::UnreadableAudio(err.to_string()),
        }
    }
}

impl From<SynthesisError> for AppError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::EmptyText | SynthesisError::TextTooLong { .. } => {
                AppError::ValidationError(err.to_string())
            }
            SynthesisError::InvalidAudio(_) => AppError::SynthesisError(err.to_string()),
            SynthesisError::Engine(EngineError::Failed(msg)) => {
                AppError::SynthesisError(format!("speech synthesis failed: {}", msg))
            }
            SynthesisError::Engine(engine_err) => engine_err.into(),
        }
    }
}

/// Every evaluation error is a problem with the submitted answer.
impl From<EvaluationError> for AppError {
    fn from(err: EvaluationError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
