//! Database models for credit-holding accounts.

use crate::types::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database request for creating a new account
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub id: AccountId,
    /// Opening balance. Granted directly, it is not a purchase and records no transaction.
    pub initial_credits: i64,
    pub payment_customer_id: Option<String>,
}

impl AccountCreateDBRequest {
    pub fn new(initial_credits: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            initial_credits,
            payment_customer_id: None,
        }
    }
}

/// Database response for an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccountDBResponse {
    pub id: AccountId,
    pub credits: i64,
    pub payment_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
