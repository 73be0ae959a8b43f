use crate::db::{
    errors::{DbError, Result},
    models::credits::{CreditDBRequest, CreditOutcome, TransactionDBResponse},
};
use crate::types::AccountId;
use sqlx::{Connection, PgConnection};

const TRANSACTION_COLUMNS: &str = "id, account_id, kind, credits, amount_paid, payment_reference, description, created_at";

/// Balance mutations and the transaction log.
///
/// Every balance change is a single conditional `UPDATE`, so concurrent debits against the same
/// account serialize on the row lock and the `credits >= 0` check can never be violated.
pub struct Credits<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Credits<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Subtract `amount` from the balance if, and only if, the balance covers it.
    ///
    /// Returns the new balance, or `None` when the balance is insufficient (nothing changes).
    pub async fn debit(&mut self, account_id: AccountId, amount: i64) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE accounts
            SET credits = credits - $2, updated_at = NOW()
            WHERE id = $1 AND credits >= $2
            RETURNING credits
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&mut *self.db)
        .await?;

        if balance.is_some() {
            return Ok(balance);
        }

        // Distinguish a short balance from a missing account
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
            .bind(account_id)
            .fetch_one(&mut *self.db)
            .await?;

        if exists { Ok(None) } else { Err(DbError::NotFound) }
    }

    /// Record a transaction and increment the balance in one database transaction.
    ///
    /// A transaction whose `payment_reference` already exists is not applied again.
    pub async fn credit(&mut self, request: &CreditDBRequest) -> Result<CreditOutcome> {
        let mut tx = self.db.begin().await?;

        // Lock the account row first so the balance read for a duplicate is consistent
        let current = sqlx::query_scalar::<_, i64>("SELECT credits FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(request.account_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        let inserted = sqlx::query_as::<_, TransactionDBResponse>(&format!(
            r#"
            INSERT INTO transactions (id, account_id, kind, credits, amount_paid, payment_reference, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (payment_reference) DO NOTHING
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(uuid::Uuid::new_v4())
        .bind(request.account_id)
        .bind(request.kind)
        .bind(request.credits)
        .bind(request.amount_paid)
        .bind(&request.payment_reference)
        .bind(&request.description)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(transaction) = inserted else {
            tx.commit().await?;
            return Ok(CreditOutcome::Duplicate { balance: current });
        };

        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE accounts
            SET credits = credits + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING credits
            "#,
        )
        .bind(request.account_id)
        .bind(request.credits)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CreditOutcome::Applied { balance, transaction })
    }

    /// List transactions for an account, newest first
    pub async fn list_transactions(&mut self, account_id: AccountId, skip: i64, limit: i64) -> Result<Vec<TransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, TransactionDBResponse>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            OFFSET $2
            LIMIT $3
            "#
        ))
        .bind(account_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(transactions)
    }
}
