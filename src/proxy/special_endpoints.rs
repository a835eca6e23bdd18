//! Special endpoint handlers for the proxy.
//!
//! This module provides response generators for built-in endpoints:
//! - `/health` - Health check with the active cache generation
//! - `/metrics` - Prometheus metrics export
//! - `/__sw/status` - Controller lifecycle, sync, client and cache state
//!
//! Functions return `EndpointResponse` instead of writing directly to the session,
//! which keeps response generation testable. The caller writes the response.

use serde::Serialize;
use std::time::Instant;

use crate::controller::ControllerStatus;
use crate::error::ControllerError;
use crate::metrics::export_prometheus;

/// Response from a special or control endpoint handler.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl EndpointResponse {
    /// Create a JSON response with the given status and body.
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    /// Serialize `value` as the JSON body; serialization failures become a 500.
    pub fn json_value<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::json(status, body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize endpoint response");
                Self::error(500, "Internal Server Error", "failed to serialize response")
            }
        }
    }

    /// Create a plain text response (for Prometheus metrics).
    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            body,
        }
    }

    /// JSON error body in the `{error, message, status}` shape
    pub fn error(status: u16, error: &str, message: &str) -> Self {
        let body = serde_json::json!({
            "error": error,
            "message": message,
            "status": status
        })
        .to_string();
        Self::json(status, body)
    }

    pub fn from_controller_error(err: &ControllerError) -> Self {
        Self::error(err.status_code(), err.kind(), &err.to_string())
    }
}

/// Generate response for /health endpoint.
pub fn handle_health(start_time: Instant, active_generation: Option<&str>) -> EndpointResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "active_generation": active_generation
    })
    .to_string();

    EndpointResponse::json(200, body)
}

/// Generate response for /metrics endpoint.
pub fn handle_metrics() -> EndpointResponse {
    EndpointResponse::prometheus(export_prometheus())
}

/// Generate response for /__sw/status endpoint.
pub fn handle_status(status: &ControllerStatus) -> EndpointResponse {
    EndpointResponse::json_value(200, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_reports_generation() {
        let response = handle_health(Instant::now(), Some("mani-news-v1.0.0"));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["active_generation"], "mani-news-v1.0.0");
    }

    #[test]
    fn test_health_without_generation_is_null() {
        let response = handle_health(Instant::now(), None);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert!(body["active_generation"].is_null());
    }

    #[test]
    fn test_metrics_uses_prometheus_content_type() {
        crate::metrics::ControllerMetrics::global().activations.inc();
        let response = handle_metrics();
        assert_eq!(response.content_type, "text/plain; version=0.0.4");
        assert!(response.body.contains("mani_offline_activations_total"));
    }

    #[test]
    fn test_controller_error_response() {
        let response = EndpointResponse::from_controller_error(&ControllerError::NoActiveGeneration);
        assert_eq!(response.status, 503);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["status"], 503);
        assert_eq!(body["error"], "no_active_generation");
    }
}
