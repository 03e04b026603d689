use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::logging::is_observability_enabled;

/// Installs the Prometheus recorder and its upkeep task.
/// Returns `None` when observability is disabled or a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if !is_observability_enabled() {
        return None;
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5,
                10.0,
            ],
        )
        .and_then(|builder| builder.install_recorder());

    let handle = match handle {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed");
            return None;
        }
    };

    let upkeep_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            upkeep_handle.run_upkeep();
        }
    });

    Some(handle)
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    if !is_observability_enabled() {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().as_str().to_owned();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    gauge!("http_requests_active").increment(1.0);

    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    counter!("http_requests_total", "method" => method.clone(), "path" => path.clone(), "status" => status.to_string()).increment(1);
    histogram!("http_request_duration_seconds", "method" => method, "path" => path).record(latency);
    counter!("http_requests_by_status", "status_category" => status_category(status)).increment(1);

    gauge!("http_requests_active").decrement(1.0);

    response
}

fn status_category(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

pub fn track_login_success(role: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("user_logins_total", "role" => role.to_string(), "status" => "success").increment(1);
}

pub fn track_login_failure(reason: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("user_logins_total", "role" => "unknown", "status" => "failure", "reason" => reason.to_string()).increment(1);
}

/// One audit row written for `kind` with `action` (create/update/delete).
pub fn track_audit_recorded(kind: &str, action: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("audit_records_total", "kind" => kind.to_string(), "action" => action.to_string())
        .increment(1);
}

pub fn track_media_upload(outcome: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("media_uploads_total", "outcome" => outcome.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_category() {
        assert_eq!(status_category(204), "2xx");
        assert_eq!(status_category(302), "3xx");
        assert_eq!(status_category(409), "4xx");
        assert_eq!(status_category(503), "5xx");
        assert_eq!(status_category(101), "other");
    }

    #[test]
    fn test_tracking_without_recorder_is_harmless() {
        track_login_success("Super Admin");
        track_login_failure("invalid_credentials");
        track_audit_recorded("class", "create");
        track_media_upload("success");
    }
}
