//! Stripe payment provider implementation

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::Decimal;
use stripe_checkout::{CheckoutSession, CheckoutSessionPaymentStatus};
use stripe_webhook::{EventObject, Webhook};

use crate::{
    config::StripeConfig,
    payment_providers::{PaymentError, PaymentProvider, PaymentSession, Result, WebhookEvent},
};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Stripe payment provider
pub struct StripeProvider {
    webhook_secret: String,
}

impl StripeProvider {
    pub fn new(webhook_secret: String) -> Self {
        Self { webhook_secret }
    }
}

impl From<StripeConfig> for StripeProvider {
    fn from(config: StripeConfig) -> Self {
        Self::new(config.webhook_secret)
    }
}

impl From<CheckoutSession> for PaymentSession {
    fn from(session: CheckoutSession) -> Self {
        let metadata: HashMap<String, String> = session.metadata.unwrap_or_default();
        let account_reference = metadata
            .get("userId")
            .cloned()
            .or(session.client_reference_id)
            .filter(|s| !s.trim().is_empty());
        let credits = metadata.get("credits").and_then(|c| c.trim().parse::<i64>().ok());
        let session_id = session.id.to_string();

        PaymentSession {
            // Purchases are keyed by payment intent; sessions without one fall back to their own id
            payment_reference: session
                .payment_intent
                .as_ref()
                .map(|intent| intent.id().to_string())
                .unwrap_or_else(|| session_id.clone()),
            session_id,
            is_paid: session.payment_status == CheckoutSessionPaymentStatus::Paid,
            // amount_total is in the smallest currency unit (cents)
            amount: session.amount_total.map(|cents| Decimal::new(cents, 2)),
            account_reference,
            credits,
            customer_id: session.customer.as_ref().map(|customer| customer.id().to_string()),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn validate_webhook(&self, headers: &HeaderMap, body: &str) -> Result<WebhookEvent> {
        // Get the Stripe signature from headers
        let signature = headers
            .get(SIGNATURE_HEADER)
            .ok_or(PaymentError::MissingSignature)?
            .to_str()
            .map_err(|_| PaymentError::InvalidSignature("header is not valid ASCII".to_string()))?;

        // Validate the webhook signature and construct the event
        let event = Webhook::construct_event(body, signature, &self.webhook_secret).map_err(|e| {
            tracing::warn!("Failed to construct webhook event: {:?}", e);
            PaymentError::InvalidSignature(e.to_string())
        })?;

        tracing::trace!("Validated Stripe webhook event: {:?}", event.type_);

        let session = match event.data.object {
            EventObject::CheckoutSessionAsyncPaymentFailed(session)
            | EventObject::CheckoutSessionAsyncPaymentSucceeded(session)
            | EventObject::CheckoutSessionCompleted(session)
            | EventObject::CheckoutSessionExpired(session) => Some((*session).into()),
            _ => None,
        };

        Ok(WebhookEvent {
            event_id: event.id.to_string(),
            event_type: format!("{:?}", event.type_),
            session,
        })
    }
}
