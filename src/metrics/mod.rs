// Metrics module - Prometheus metrics for the offline controller
//
// Provides counters, histograms, and gauges for:
// - Request classification and response sources
// - Cache lookups and writes
// - Generation lifecycle (installs, activations, reclaimed generations)
// - Background sync, push notifications, and client messages

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;

/// Global metrics registry for the controller
pub struct ControllerMetrics {
    /// Cache lookups answered from the active generation
    pub cache_hits: IntCounter,

    /// Cache lookups that found nothing
    pub cache_misses: IntCounter,

    /// Responses written to the active generation
    pub cache_stores: IntCounter,

    /// Failed cache reads or writes (treated as misses / skipped writes)
    pub cache_errors: IntCounter,

    /// Requests by classification (cache-first, network-first, bypass)
    pub classifications: IntCounterVec,

    /// Responses by source (network, cache, fallback_image, offline_page)
    pub responses: IntCounterVec,

    /// Network fetches that failed with an error
    pub network_failures: IntCounter,

    /// End-to-end handling time per classification (in seconds)
    pub request_duration: HistogramVec,

    /// Install attempts by outcome (success, failure)
    pub installs: IntCounterVec,

    /// Completed activations
    pub activations: IntCounter,

    /// Deleted generations by reason (activation, quota)
    pub generations_reclaimed: IntCounterVec,

    /// Sync task runs by tag and outcome
    pub sync_runs: IntCounterVec,

    /// Notifications produced from push messages
    pub push_notifications: IntCounter,

    /// Notification clicks by action
    pub notification_clicks: IntCounterVec,

    /// Client messages by type
    pub messages: IntCounterVec,

    /// Requests rejected by the front door (uri_too_long, suspicious_content)
    pub rejected_requests: IntCounterVec,

    /// Currently registered client views
    pub connected_clients: IntGauge,
}

/// Global singleton instance of metrics
static METRICS: OnceLock<ControllerMetrics> = OnceLock::new();

impl ControllerMetrics {
    /// Initialize and return the global metrics instance
    ///
    /// Subsequent calls return the same instance.
    pub fn global() -> &'static Self {
        METRICS.get_or_init(|| {
            let cache_ops = register_int_counter_vec!(
                "mani_offline_cache_operations_total",
                "Total number of cache operations by type",
                &["operation"] // hit, miss, store, error
            )
            .expect("Failed to register cache_operations_total metric");

            let classifications = register_int_counter_vec!(
                "mani_offline_requests_total",
                "Total number of intercepted requests by classification",
                &["classification"]
            )
            .expect("Failed to register requests_total metric");

            let responses = register_int_counter_vec!(
                "mani_offline_responses_total",
                "Total number of controller responses by source",
                &["source"]
            )
            .expect("Failed to register responses_total metric");

            let network_failures = register_int_counter!(
                "mani_offline_network_failures_total",
                "Total number of failed network fetches"
            )
            .expect("Failed to register network_failures_total metric");

            let request_duration = register_histogram_vec!(
                "mani_offline_request_duration_seconds",
                "Duration of request handling in seconds",
                &["classification"],
                vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
            )
            .expect("Failed to register request_duration_seconds metric");

            let installs = register_int_counter_vec!(
                "mani_offline_installs_total",
                "Total number of generation installs by outcome",
                &["outcome"]
            )
            .expect("Failed to register installs_total metric");

            let activations = register_int_counter!(
                "mani_offline_activations_total",
                "Total number of generation activations"
            )
            .expect("Failed to register activations_total metric");

            let generations_reclaimed = register_int_counter_vec!(
                "mani_offline_generations_reclaimed_total",
                "Total number of deleted cache generations by reason",
                &["reason"]
            )
            .expect("Failed to register generations_reclaimed_total metric");

            let sync_runs = register_int_counter_vec!(
                "mani_offline_sync_runs_total",
                "Total number of background sync runs by tag and outcome",
                &["tag", "outcome"]
            )
            .expect("Failed to register sync_runs_total metric");

            let push_notifications = register_int_counter!(
                "mani_offline_push_notifications_total",
                "Total number of notifications shown for push messages"
            )
            .expect("Failed to register push_notifications_total metric");

            let notification_clicks = register_int_counter_vec!(
                "mani_offline_notification_clicks_total",
                "Total number of notification clicks by action",
                &["action"]
            )
            .expect("Failed to register notification_clicks_total metric");

            let messages = register_int_counter_vec!(
                "mani_offline_messages_total",
                "Total number of client messages by type",
                &["type"]
            )
            .expect("Failed to register messages_total metric");

            let rejected_requests = register_int_counter_vec!(
                "mani_offline_rejected_requests_total",
                "Total number of requests rejected before classification",
                &["reason"]
            )
            .expect("Failed to register rejected_requests_total metric");

            let connected_clients = register_int_gauge!(
                "mani_offline_connected_clients",
                "Current number of registered client views"
            )
            .expect("Failed to register connected_clients metric");

            ControllerMetrics {
                cache_hits: cache_ops.with_label_values(&["hit"]),
                cache_misses: cache_ops.with_label_values(&["miss"]),
                cache_stores: cache_ops.with_label_values(&["store"]),
                cache_errors: cache_ops.with_label_values(&["error"]),
                classifications,
                responses,
                network_failures,
                request_duration,
                installs,
                activations,
                generations_reclaimed,
                sync_runs,
                push_notifications,
                notification_clicks,
                messages,
                rejected_requests,
                connected_clients,
            }
        })
    }

    /// Start timing the handling of a request with the given classification
    pub fn start_request_timer(&self, classification: &str) -> HistogramTimer {
        HistogramTimer {
            histogram: self.request_duration.with_label_values(&[classification]),
            start: std::time::Instant::now(),
        }
    }
}

/// RAII timer for histogram metrics
///
/// Automatically records duration when dropped.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Manually observe and consume the timer
    pub fn observe_duration(self) {
        // Drop records the observation
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Export every registered metric in Prometheus text format
pub fn export_prometheus() -> String {
    // Make sure the controller metrics exist even before the first request
    let _ = ControllerMetrics::global();

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
