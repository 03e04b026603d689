//! Schoolyard observability.
//!
//! - Structured logging to the console and daily rolling files
//! - Distributed tracing via OpenTelemetry (OTLP)
//! - Prometheus metrics for HTTP traffic, logins, audit records and uploads
//!
//! Compiled in with the `observability` feature (default) and switchable
//! at runtime with `OBSERVABILITY_ENABLED`. With the feature off every
//! entry point still exists: tracing falls back to console logging and the
//! rest become no-ops.
//!
//! ```no_run
//! use schoolyard_observability::{init_tracing, shutdown_tracer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_tracing()?;
//!     // ... application code ...
//!     shutdown_tracer().await;
//!     Ok(())
//! }
//! ```

pub mod basic_logging;

#[cfg(feature = "observability")]
pub mod logging;
#[cfg(feature = "observability")]
pub mod metrics;

#[cfg(feature = "observability")]
pub use metrics_exporter_prometheus::PrometheusHandle as MetricsHandle;

#[cfg(feature = "observability")]
pub use logging::{
    init_tracing, is_observability_enabled, logging_middleware, shutdown_tracer,
};
#[cfg(feature = "observability")]
pub use metrics::{
    init_metrics, metrics_middleware, track_audit_recorded, track_login_failure,
    track_login_success, track_media_upload,
};

#[cfg(not(feature = "observability"))]
pub mod stubs {
    use axum::{extract::Request, middleware::Next, response::Response};

    use crate::basic_logging::init_basic_console_logging;

    /// Stands in for the Prometheus handle; renders nothing.
    #[derive(Clone, Debug, Default)]
    pub struct MetricsHandle;

    impl MetricsHandle {
        pub fn render(&self) -> String {
            String::new()
        }
    }

    pub fn is_observability_enabled() -> bool {
        false
    }

    pub async fn logging_middleware(req: Request, next: Next) -> Response {
        next.run(req).await
    }

    pub async fn metrics_middleware(req: Request, next: Next) -> Response {
        next.run(req).await
    }

    pub fn init_tracing() -> anyhow::Result<()> {
        init_basic_console_logging();
        Ok(())
    }

    pub async fn shutdown_tracer() {}

    pub fn init_metrics() -> Option<MetricsHandle> {
        None
    }

    pub fn track_login_success(_role: &str) {}
    pub fn track_login_failure(_reason: &str) {}
    pub fn track_audit_recorded(_kind: &str, _action: &str) {}
    pub fn track_media_upload(_outcome: &str) {}
}

#[cfg(not(feature = "observability"))]
pub use stubs::*;
