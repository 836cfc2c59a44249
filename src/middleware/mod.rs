pub mod correlation;
pub mod metrics;

pub use correlation::{CorrelationId, RequestCorrelation};
pub use metrics::MetricsMiddleware;
