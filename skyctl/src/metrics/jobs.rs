//! Enhancement and upscale pipeline metrics.

use once_cell::sync::Lazy;
use prometheus::{HistogramVec, IntCounterVec, register_histogram_vec, register_int_counter_vec};

/// Jobs by terminal status
static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("skyctl_jobs_finished_total", "Enhancement jobs by terminal status", &["status"])
        .expect("Failed to register skyctl_jobs_finished_total metric")
});

/// Provider call latency
/// Buckets: 1s, 5s, 10s, 20s, 30s, 60s, 90s, 120s, 300s
static PROVIDER_CALL_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "skyctl_provider_call_seconds",
        "Duration of generation and upscale provider calls (seconds)",
        &["provider", "operation", "outcome"],
        vec![1.0, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0, 120.0, 300.0]
    )
    .expect("Failed to register skyctl_provider_call_seconds metric")
});

pub fn record_job_finished(status: &str) {
    JOBS_FINISHED.with_label_values(&[status]).inc();
}

pub fn record_provider_call(provider: &str, operation: &str, outcome: &str, seconds: f64) {
    PROVIDER_CALL_SECONDS
        .with_label_values(&[provider, operation, outcome])
        .observe(seconds);
}
