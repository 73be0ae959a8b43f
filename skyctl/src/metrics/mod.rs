//! Prometheus metrics for the ledger, the job pipeline and payment webhooks.
//!
//! Counters are registered lazily in the default registry and exported at
//! `/internal/metrics` alongside the HTTP metrics when `enable_metrics` is set.

pub mod credits;
pub mod jobs;
pub mod webhooks;
