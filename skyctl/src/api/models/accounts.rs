//! API request/response models for accounts and their ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::models::{
        accounts::AccountDBResponse,
        credits::{TransactionDBResponse, TransactionKind},
    },
    types::AccountId,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AccountId,
    pub credits: i64,
    pub payment_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AccountDBResponse> for AccountResponse {
    fn from(db: AccountDBResponse) -> Self {
        Self {
            id: db.id,
            credits: db.credits,
            payment_customer_id: db.payment_customer_id,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub kind: TransactionKind,
    pub credits: i64,
    /// Money received, as a string to preserve precision (zero for refunds)
    #[schema(value_type = String)]
    pub amount_paid: Decimal,
    pub payment_reference: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionDBResponse> for TransactionResponse {
    fn from(db: TransactionDBResponse) -> Self {
        Self {
            id: db.id,
            kind: db.kind,
            credits: db.credits,
            amount_paid: db.amount_paid,
            payment_reference: db.payment_reference,
            description: db.description,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListResponse {
    /// Newest first
    pub data: Vec<TransactionResponse>,
    pub skip: i64,
    pub limit: i64,
    /// Balance at the time of the request
    pub credits: i64,
}
