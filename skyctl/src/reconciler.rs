//! Payment webhook reconciliation.
//!
//! Turns verified payment events into ledger credits. Processors deliver at least once and in
//! any order, so the purchase is keyed by its payment reference and a replay is acknowledged
//! without a second increment. Events that cannot be acted on are acknowledged too: only a
//! storage failure asks the processor to retry.

use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::{Storage, models::credits::CreditOutcome},
    errors::{Error, Result},
    ledger::CreditLedger,
    metrics,
    payment_providers::{PaymentProvider, PaymentSession},
    types::{AccountId, abbrev_uuid},
};

/// What a webhook delivery did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Credited { account_id: AccountId, credits: i64, balance: i64 },
    /// The payment reference was already applied
    Duplicate { account_id: AccountId },
    /// Acknowledged without touching the ledger
    Ignored { reason: &'static str },
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Credited { .. } => "credited",
            ReconcileOutcome::Duplicate { .. } => "duplicate",
            ReconcileOutcome::Ignored { .. } => "ignored",
        }
    }
}

#[derive(Clone)]
pub struct WebhookReconciler {
    provider: Arc<dyn PaymentProvider>,
    ledger: CreditLedger,
    storage: Arc<dyn Storage>,
}

impl WebhookReconciler {
    pub fn new(provider: Arc<dyn PaymentProvider>, ledger: CreditLedger, storage: Arc<dyn Storage>) -> Self {
        Self { provider, ledger, storage }
    }

    /// Verify and apply one webhook delivery.
    ///
    /// Signature failures change nothing and are returned as errors; everything after
    /// verification resolves to an outcome except a storage failure.
    #[instrument(skip_all, fields(provider = self.provider.name()))]
    pub async fn reconcile(&self, headers: &HeaderMap, body: &str) -> Result<ReconcileOutcome> {
        let event = match self.provider.validate_webhook(headers, body).await {
            Ok(event) => event,
            Err(e) => {
                metrics::webhooks::record_webhook("rejected");
                return Err(e.into());
            }
        };

        let outcome = if !event.settles_payment() {
            debug!(event_id = %event.event_id, event_type = %event.event_type, "Ignoring webhook event type");
            Ok(ReconcileOutcome::Ignored { reason: "event_type" })
        } else {
            match event.session {
                Some(session) => self.apply(session).await,
                None => {
                    warn!(event_id = %event.event_id, "Settlement event without a checkout session");
                    Ok(ReconcileOutcome::Ignored { reason: "no_session" })
                }
            }
        };

        match &outcome {
            Ok(o) => metrics::webhooks::record_webhook(o.label()),
            Err(_) => metrics::webhooks::record_webhook("failed"),
        }
        outcome
    }

    async fn apply(&self, session: PaymentSession) -> Result<ReconcileOutcome> {
        if !session.is_paid {
            debug!(session = %session.session_id, "Checkout session not paid yet");
            return Ok(ReconcileOutcome::Ignored { reason: "unpaid" });
        }

        let Some(account_id) = session.account_reference.as_deref().and_then(|r| Uuid::parse_str(r).ok()) else {
            warn!(session = %session.session_id, reference = ?session.account_reference, "Checkout session has no valid account id");
            return Ok(ReconcileOutcome::Ignored { reason: "invalid_account" });
        };

        let credits = match session.credits {
            Some(credits) if credits > 0 => credits,
            other => {
                warn!(session = %session.session_id, credits = ?other, "Checkout session has no positive credit quantity");
                return Ok(ReconcileOutcome::Ignored { reason: "invalid_credits" });
            }
        };

        let amount = session.amount.unwrap_or_default();
        let outcome = match self.ledger.purchase(account_id, credits, amount, &session.payment_reference).await {
            Ok(outcome) => outcome,
            // Retrying will not make the account appear
            Err(Error::NotFound { .. }) => {
                warn!(account = %abbrev_uuid(&account_id), session = %session.session_id, "Payment for unknown account");
                return Ok(ReconcileOutcome::Ignored { reason: "unknown_account" });
            }
            Err(e) => {
                error!(error = %e, session = %session.session_id, "Failed to apply payment");
                return Err(e);
            }
        };

        if let Some(customer_id) = session.customer_id.as_deref() {
            match self.storage.link_payment_customer(account_id, customer_id).await {
                Ok(true) => info!(account = %abbrev_uuid(&account_id), "Linked payment customer"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Failed to link payment customer"),
            }
        }

        Ok(match outcome {
            CreditOutcome::Applied { balance, .. } => {
                info!(account = %abbrev_uuid(&account_id), credits, balance, reference = %session.payment_reference, "Applied purchase");
                ReconcileOutcome::Credited {
                    account_id,
                    credits,
                    balance,
                }
            }
            CreditOutcome::Duplicate { .. } => ReconcileOutcome::Duplicate { account_id },
        })
    }
}
