//! # Application State Management
//!
//! Shared state that every HTTP request handler can reach.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Lets every worker thread share ownership of the same data
//! - **Memory safety**: The data is freed when the last reference is dropped
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Many readers OR one writer at a time
//! - **Used for**: Runtime configuration and request metrics, the only mutable
//!   shared state in the service
//!
//! The speech engines are *not* behind these locks: the orchestrator owns them
//! and each engine serialises itself through its own gate.
//!
//! ## Poisoned locks:
//! A panic while holding a lock poisons it. Metrics and config are plain data
//! that stay consistent after every single write, so a poisoned lock is
//! recovered with `into_inner()` instead of taking the whole server down.

use crate::config::AppConfig;
use crate::orchestrator::{Orchestrator, PipelineOptions};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The main application state, cloned into every actix worker.
///
/// ## Thread Safety Pattern:
/// - **config / metrics**: `Arc<RwLock<T>>`, shared mutable data
/// - **orchestrator**: `Arc<T>`, shared immutable handle to the engines
/// - **start_time**: `Instant` is `Copy`, no sharing machinery needed
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request metrics (updated by the metrics middleware on every request)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Speech engines and evaluation, constructed once at start-up
    pub orchestrator: Arc<Orchestrator>,

    /// When the server started
    pub start_time: Instant,
}

/// Request metrics collected across all HTTP requests.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of error responses (4xx and 5xx) since server start
    pub error_count: u64,

    /// Requests currently being handled
    pub in_flight: u32,

    /// Per-route statistics, keyed by "METHOD /route/pattern"
    pub endpoint_metrics: BTreeMap<String, EndpointMetric>,
}

/// Performance metrics for one route.
///
/// ## Derived values:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone, Serialize)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, orchestrator: Orchestrator) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            orchestrator: Arc::new(orchestrator),
            start_time: Instant::now(),
        }
    }

    fn read_config(&self) -> RwLockReadGuard<'_, AppConfig> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    pub fn get_config(&self) -> AppConfig {
        self.read_config().clone()
    }

    /// Snapshot of the per-request knobs for one pipeline run.
    pub fn pipeline_options(&self) -> PipelineOptions {
        self.read_config().pipeline_options()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> anyhow::Result<()> {
        new_config.validate()?;
        *self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = new_config;
        Ok(())
    }

    /// Called by the metrics middleware when a request enters the service.
    pub fn request_started(&self) {
        let mut metrics = self.write_metrics();
        metrics.request_count += 1;
        metrics.in_flight += 1;
    }

    /// Called by the metrics middleware when a request leaves the service.
    ///
    /// ## Parameters:
    /// - **endpoint**: Route key, e.g. "POST /api/v1/interview"
    /// - **duration_ms**: Time spent handling the request
    /// - **is_error**: Whether the response was 4xx/5xx
    pub fn request_finished(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.write_metrics();

        metrics.in_flight = metrics.in_flight.saturating_sub(1);
        if is_error {
            metrics.error_count += 1;
        }

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Get a consistent copy of the current metrics.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed, 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
