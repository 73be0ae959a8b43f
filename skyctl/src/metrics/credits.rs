//! Credit ledger metrics for Prometheus.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, register_int_counter, register_int_counter_vec};

/// Credits added to balances, by transaction kind
static CREDITS_ADDED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("skyctl_credits_added_total", "Total credits added to account balances", &["kind"])
        .expect("Failed to register skyctl_credits_added_total metric")
});

/// Credits debited for enhancement jobs
static CREDITS_DEBITED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("skyctl_credits_debited_total", "Total credits debited for enhancement jobs")
        .expect("Failed to register skyctl_credits_debited_total metric")
});

/// Debits refused because the balance was too low
static INSUFFICIENT_CREDITS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "skyctl_credits_insufficient_total",
        "Total debits refused for insufficient credits"
    )
    .expect("Failed to register skyctl_credits_insufficient_total metric")
});

pub fn record_debit(amount: i64) {
    CREDITS_DEBITED.inc_by(amount.max(0) as u64);
}

pub fn record_insufficient_credits() {
    INSUFFICIENT_CREDITS.inc();
}

/// Record credits added by a purchase or refund
pub fn record_credit(kind: &str, amount: i64) {
    CREDITS_ADDED.with_label_values(&[kind]).inc_by(amount.max(0) as u64);
}
