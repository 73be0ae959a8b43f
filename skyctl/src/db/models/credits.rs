//! Database models for ledger transactions.

use crate::types::{AccountId, JobId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Transaction kind enum stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credits bought through the payment processor
    Purchase,
    /// Compensation for an enhancement job that failed after its debit
    Refund,
}

/// Database request for crediting an account.
///
/// `payment_reference` is globally unique: a second request with the same reference is a no-op.
#[derive(Debug, Clone)]
pub struct CreditDBRequest {
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub credits: i64,
    pub amount_paid: Decimal,
    pub payment_reference: String,
    pub description: Option<String>,
}

impl CreditDBRequest {
    /// A purchase settled by the payment processor
    pub fn purchase(account_id: AccountId, credits: i64, amount_paid: Decimal, payment_reference: impl Into<String>) -> Self {
        Self {
            account_id,
            kind: TransactionKind::Purchase,
            credits,
            amount_paid,
            payment_reference: payment_reference.into(),
            description: Some("Card payment".to_string()),
        }
    }

    /// The compensating credit for a failed job. Keyed by the job id so the reversal
    /// can only ever be applied once.
    pub fn job_refund(account_id: AccountId, job_id: JobId, credits: i64) -> Self {
        Self {
            account_id,
            kind: TransactionKind::Refund,
            credits,
            amount_paid: Decimal::ZERO,
            payment_reference: refund_reference(job_id),
            description: Some(format!("Refund for failed enhancement job {job_id}")),
        }
    }
}

/// Idempotency key used for a job's refund
pub fn refund_reference(job_id: JobId) -> String {
    format!("refund_{job_id}")
}

/// Database response for a ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransactionDBResponse {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub credits: i64,
    pub amount_paid: Decimal,
    pub payment_reference: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a credit operation
#[derive(Debug, Clone, PartialEq)]
pub enum CreditOutcome {
    /// The balance was incremented and the transaction recorded
    Applied { balance: i64, transaction: TransactionDBResponse },
    /// A transaction with this payment reference already exists; nothing changed
    Duplicate { balance: i64 },
}

impl CreditOutcome {
    pub fn balance(&self) -> i64 {
        match self {
            CreditOutcome::Applied { balance, .. } | CreditOutcome::Duplicate { balance } => *balance,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CreditOutcome::Duplicate { .. })
    }
}
