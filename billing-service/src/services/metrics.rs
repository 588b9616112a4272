//! Prometheus metrics for billing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    Encoder, IntCounter, IntCounterVec, TextEncoder,
};

/// Invoices issued.
pub static INVOICES_ISSUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "billing_invoices_issued_total",
        "Total number of invoices issued"
    )
    .expect("Failed to register invoices_issued_total")
});

/// Malformed line-item rows skipped during invoice creation.
pub static LINES_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "billing_lines_skipped_total",
        "Total number of malformed invoice line rows skipped"
    )
    .expect("Failed to register lines_skipped_total")
});

/// Notification dispatches by channel and outcome.
pub static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "billing_notifications_total",
        "Total number of notification dispatches",
        &["channel", "outcome"] // sent, failed, skipped
    )
    .expect("Failed to register notifications_total")
});

/// Store operation duration histogram.
pub static STORE_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "billing_store_query_duration_seconds",
        "Store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register store_query_duration")
});

/// Encode all registered metrics in the Prometheus text format.
pub fn encode() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
