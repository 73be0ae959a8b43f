//! Payment webhook metrics.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, register_int_counter_vec};

/// Webhook deliveries by outcome (credited, duplicate, ignored, rejected, failed)
static WEBHOOK_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("skyctl_webhook_events_total", "Payment webhook deliveries by outcome", &["outcome"])
        .expect("Failed to register skyctl_webhook_events_total metric")
});

pub fn record_webhook(outcome: &str) {
    WEBHOOK_EVENTS.with_label_values(&[outcome]).inc();
}
