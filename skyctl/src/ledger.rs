//! Credit ledger: the only way account balances change.
//!
//! Debits are conditional single-statement updates and credits are keyed by a globally unique
//! payment reference, so neither needs an in-process lock and both stay correct across
//! concurrent requests and replicas.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::{
    db::{
        Storage,
        errors::DbError,
        models::{
            accounts::AccountDBResponse,
            credits::{CreditDBRequest, CreditOutcome, TransactionDBResponse, TransactionKind},
        },
    },
    errors::{Error, Result},
    metrics,
    types::{AccountId, JobId, abbrev_uuid},
};

#[derive(Clone)]
pub struct CreditLedger {
    storage: Arc<dyn Storage>,
}

impl CreditLedger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Subtract `amount` credits, returning the new balance.
    ///
    /// Fails with [`Error::InsufficientCredits`] (and changes nothing) when the balance is
    /// lower than `amount`.
    #[instrument(skip(self), fields(account = %abbrev_uuid(&account_id)), err)]
    pub async fn debit(&self, account_id: AccountId, amount: i64) -> Result<i64> {
        ensure_positive(amount)?;

        match self.storage.debit(account_id, amount).await.map_err(|e| not_found(e, account_id))? {
            Some(balance) => {
                metrics::credits::record_debit(amount);
                info!(amount, balance, "Debited credits");
                Ok(balance)
            }
            None => {
                metrics::credits::record_insufficient_credits();
                Err(Error::InsufficientCredits { account_id })
            }
        }
    }

    /// Add credits under an idempotency key.
    ///
    /// Replaying a key is not an error: it returns [`CreditOutcome::Duplicate`] with the
    /// current balance.
    #[instrument(skip(self, request), fields(account = %abbrev_uuid(&request.account_id), reference = %request.payment_reference), err)]
    pub async fn credit(&self, request: CreditDBRequest) -> Result<CreditOutcome> {
        ensure_positive(request.credits)?;
        if request.payment_reference.trim().is_empty() {
            return Err(Error::Validation {
                message: "A payment reference is required".to_string(),
            });
        }

        let outcome = self.storage.credit(&request).await.map_err(|e| not_found(e, request.account_id))?;

        match &outcome {
            CreditOutcome::Applied { balance, .. } => {
                metrics::credits::record_credit(kind_label(request.kind), request.credits);
                info!(credits = request.credits, balance, kind = kind_label(request.kind), "Credited account");
            }
            CreditOutcome::Duplicate { balance } => {
                info!(balance, "Payment reference already applied, skipping");
            }
        }

        Ok(outcome)
    }

    /// Record a purchase settled by the payment processor
    pub async fn purchase(&self, account_id: AccountId, credits: i64, amount_paid: Decimal, payment_reference: &str) -> Result<CreditOutcome> {
        self.credit(CreditDBRequest::purchase(account_id, credits, amount_paid, payment_reference))
            .await
    }

    /// Reverse a failed job's debit. Keyed by the job id, so repeated calls refund once.
    pub async fn refund_job(&self, account_id: AccountId, job_id: JobId, credits: i64) -> Result<CreditOutcome> {
        self.credit(CreditDBRequest::job_refund(account_id, job_id, credits)).await
    }

    pub async fn account(&self, account_id: AccountId) -> Result<AccountDBResponse> {
        self.storage.get_account(account_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })
    }

    pub async fn balance(&self, account_id: AccountId) -> Result<i64> {
        Ok(self.account(account_id).await?.credits)
    }

    pub async fn transactions(&self, account_id: AccountId, skip: i64, limit: i64) -> Result<Vec<TransactionDBResponse>> {
        // Distinguish an unknown account from one with no history
        self.account(account_id).await?;
        Ok(self.storage.list_transactions(account_id, skip, limit).await?)
    }
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::Validation {
            message: format!("Credit amount must be positive, got {amount}"),
        });
    }
    Ok(())
}

fn not_found(err: DbError, account_id: AccountId) -> Error {
    match err {
        DbError::NotFound => Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        },
        other => other.into(),
    }
}

fn kind_label(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Purchase => "purchase",
        TransactionKind::Refund => "refund",
    }
}
