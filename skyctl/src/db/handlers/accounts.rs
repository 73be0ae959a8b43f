use crate::db::{
    errors::Result,
    models::accounts::{AccountCreateDBRequest, AccountDBResponse},
};
use crate::types::AccountId;
use sqlx::PgConnection;

const ACCOUNT_COLUMNS: &str = "id, credits, payment_customer_id, created_at, updated_at";

pub struct Accounts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        let account = sqlx::query_as::<_, AccountDBResponse>(&format!(
            r#"
            INSERT INTO accounts (id, credits, payment_customer_id)
            VALUES ($1, $2, $3)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(request.initial_credits)
        .bind(&request.payment_customer_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account)
    }

    pub async fn get_by_id(&mut self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account)
    }

    /// Record the payment processor's customer id, keeping any id already stored.
    /// Returns whether the account was updated.
    pub async fn link_payment_customer(&mut self, id: AccountId, customer_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET payment_customer_id = $2, updated_at = NOW()
            WHERE id = $1 AND payment_customer_id IS NULL
            "#,
        )
        .bind(id)
        .bind(customer_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
