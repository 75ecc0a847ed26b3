use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count a webhook event by type and reconciliation outcome.
pub fn record_webhook_event(event_type: &str, outcome: &str) {
    let labels = [
        ("event_type", event_type.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!("billing_webhook_events_total", &labels).increment(1);
}

/// Count a recorded purchase by currency.
pub fn record_purchase(currency: &str) {
    let labels = [("currency", currency.to_string())];
    counter!("billing_purchases_total", &labels).increment(1);
}
