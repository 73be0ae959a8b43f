//! Payment provider abstraction layer
//!
//! This module defines the `PaymentProvider` trait which turns a processor's signed webhook
//! delivery into a provider-neutral [`WebhookEvent`]. Crediting accounts from those events is
//! the reconciler's job, not the provider's.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::Decimal;

use crate::{config::PaymentConfig, errors::Error};

pub mod stripe;

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here.
pub fn create_provider(config: PaymentConfig) -> Arc<dyn PaymentProvider> {
    match config {
        PaymentConfig::Stripe(stripe_config) => Arc::new(stripe::StripeProvider::from(stripe_config)),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur validating a webhook delivery
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

impl From<PaymentError> for Error {
    fn from(err: PaymentError) -> Self {
        Error::Signature { reason: err.to_string() }
    }
}

/// A checkout session as reported by the processor
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession {
    pub session_id: String,
    pub is_paid: bool,
    /// Amount paid, in currency units
    pub amount: Option<Decimal>,
    /// Raw account reference; not yet known to be a valid account id
    pub account_reference: Option<String>,
    /// Credits purchased, when present and numeric
    pub credits: Option<i64>,
    /// Processor-side customer id
    pub customer_id: Option<String>,
    /// Idempotency key for the purchase: the payment intent, else the session id
    pub payment_reference: String,
}

/// Represents a verified webhook event from a payment provider
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub event_id: String,
    /// Type of event (e.g., "CheckoutSessionCompleted")
    pub event_type: String,
    /// Present for checkout session events
    pub session: Option<PaymentSession>,
}

impl WebhookEvent {
    /// Whether this event type can settle a purchase
    pub fn settles_payment(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            "CheckoutSessionCompleted" | "CheckoutSessionAsyncPaymentSucceeded"
        )
    }
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Validate and extract a webhook event from raw request data
    ///
    /// Returns Err if the signature is missing or invalid, or the signed body is not a
    /// well-formed event. Nothing in the body is trusted before the signature checks out.
    async fn validate_webhook(&self, headers: &HeaderMap, body: &str) -> Result<WebhookEvent>;
}
