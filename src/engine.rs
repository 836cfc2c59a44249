//! # Engine Gate
//!
//! Resource model for the external speech engines (recognizer, synthesizer).
//!
//! A speech engine is a process-wide resource: a local synthesizer owns an
//! audio device or a model, a remote one has its own concurrency limits. Every
//! call into an engine therefore goes through an `EngineGate`:
//!
//! - **Scoped acquisition**: a semaphore permit is taken before the call and
//!   released when the call finishes, fails, or is cancelled.
//! - **Serialisation**: with one permit (the default) calls are strictly one at a time.
//! - **Deadline**: the caller's timeout covers the wait for the permit *and*
//!   the call itself, so a stuck engine cannot hang a request.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Failure reported by (or about) an external engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine could not be reached (connection refused, disabled, shut down)
    Unavailable(String),
    /// The engine answered but the call failed
    Failed(String),
    /// The call did not finish before the caller's deadline
    Timeout(Duration),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Unavailable(msg) => write!(f, "engine unavailable: {}", msg),
            EngineError::Failed(msg) => write!(f, "engine failed: {}", msg),
            EngineError::Timeout(after) => {
                write!(f, "engine did not answer within {} ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Serialising, deadline-enforcing wrapper around one engine.
pub struct EngineGate {
    name: String,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl EngineGate {
    /// Create a gate that lets `max_concurrent` calls in at once (at least one).
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        let capacity = max_concurrent.max(1);
        Self {
            name: name.into(),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held by a call.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `call` while holding a permit, giving up after `timeout`.
    ///
    /// The permit lives inside the timed future, so it is dropped on every exit
    /// path: success, engine error, or the deadline firing and cancelling the call.
    pub async fn run<T, F>(&self, timeout: Duration, call: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let requested_at = Instant::now();

        let guarded = async {
            let _permit = self.permits.acquire().await.map_err(|_| {
                EngineError::Unavailable(format!("{} engine has been shut down", self.name))
            })?;

            tracing::debug!(
                engine = %self.name,
                waited_ms = requested_at.elapsed().as_millis() as u64,
                "Engine acquired"
            );

            call.await
        };

        match tokio::time::timeout(timeout, guarded).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    engine = %self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Engine call timed out"
                );
                Err(EngineError::Timeout(timeout))
            }
        }
    }

    /// Refuse all future calls. Calls already holding a permit finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// Classify a transport-level failure talking to a remote engine.
///
/// Connection problems mean the engine is unreachable; anything else
/// (body decoding, redirects, ...) is a failed call.
pub fn transport_error(engine: &str, err: reqwest::Error) -> EngineError {
    if err.is_connect() || err.is_timeout() {
        EngineError::Unavailable(format!("{} is unreachable: {}", engine, err))
    } else {
        EngineError::Failed(format!("{} request failed: {}", engine, err))
    }
}

/// Classify a non-success HTTP status returned by a remote engine.
pub fn status_error(engine: &str, status: reqwest::StatusCode, body: &str) -> EngineError {
    let detail: String = body.chars().take(200).collect();
    match status.as_u16() {
        429 | 502 | 503 | 504 => EngineError::Unavailable(format!(
            "{} answered {}: {}",
            engine, status, detail
        )),
        _ => EngineError::Failed(format!("{} answered {}: {}", engine, status, detail)),
    }
}
