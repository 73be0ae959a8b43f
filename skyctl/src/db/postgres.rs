//! PostgreSQL-backed [`Storage`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{
    Storage,
    errors::{DbError, Result},
    handlers::{Accounts, Credits, Jobs, Variations},
    models::{
        accounts::{AccountCreateDBRequest, AccountDBResponse},
        credits::{CreditDBRequest, CreditOutcome, TransactionDBResponse},
        jobs::{JobCreateDBRequest, JobDBResponse},
        variations::{ArtifactCreateDBRequest, ArtifactDBResponse, VariationDBResponse},
    },
};
use crate::types::{AccountId, ArtifactId, JobId, VariationId};

/// [`Storage`] over a Postgres connection pool. Each call checks out one connection and hands
/// it to the matching repository in [`super::handlers`].
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).create(request).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).get_by_id(id).await
    }

    async fn link_payment_customer(&self, id: AccountId, customer_id: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let mut accounts = Accounts::new(&mut conn);
        if accounts.link_payment_customer(id, customer_id).await? {
            return Ok(true);
        }
        match accounts.get_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(DbError::NotFound),
        }
    }

    async fn debit(&self, account_id: AccountId, amount: i64) -> Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Credits::new(&mut conn).debit(account_id, amount).await
    }

    async fn credit(&self, request: &CreditDBRequest) -> Result<CreditOutcome> {
        let mut conn = self.pool.acquire().await?;
        Credits::new(&mut conn).credit(request).await
    }

    async fn list_transactions(&self, account_id: AccountId, skip: i64, limit: i64) -> Result<Vec<TransactionDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Credits::new(&mut conn).list_transactions(account_id, skip, limit).await
    }

    async fn create_job(&self, request: &JobCreateDBRequest) -> Result<JobDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Jobs::new(&mut conn).create(request).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<JobDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Jobs::new(&mut conn).get_by_id(id).await
    }

    async fn mark_job_processing(&self, id: JobId) -> Result<JobDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Jobs::new(&mut conn).mark_processing(id).await
    }

    async fn complete_job(&self, id: JobId, provider_cost: Decimal, urls: &[String]) -> Result<(JobDBResponse, Vec<VariationDBResponse>)> {
        let mut conn = self.pool.acquire().await?;
        Jobs::new(&mut conn).complete(id, provider_cost, urls).await
    }

    async fn fail_job(&self, id: JobId, error_message: &str) -> Result<JobDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Jobs::new(&mut conn).fail(id, error_message).await
    }

    async fn list_variations(&self, job_id: JobId) -> Result<Vec<VariationDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Variations::new(&mut conn).list_for_job(job_id).await
    }

    async fn get_variation(&self, id: VariationId) -> Result<Option<VariationDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Variations::new(&mut conn).get_by_id(id).await
    }

    async fn get_variation_by_url(&self, url: &str) -> Result<Option<VariationDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Variations::new(&mut conn).get_by_url(url).await
    }

    async fn select_variation(&self, id: VariationId) -> Result<VariationDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Variations::new(&mut conn).select(id).await
    }

    async fn get_artifact(&self, id: ArtifactId) -> Result<Option<ArtifactDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Variations::new(&mut conn).get_artifact(id).await
    }

    async fn get_artifact_for_variation(&self, variation_id: VariationId) -> Result<Option<ArtifactDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Variations::new(&mut conn).get_artifact_for_variation(variation_id).await
    }

    async fn create_artifact(&self, request: &ArtifactCreateDBRequest) -> Result<ArtifactDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Variations::new(&mut conn).create_artifact(request).await
    }

    async fn record_download(&self, id: ArtifactId) -> Result<ArtifactDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Variations::new(&mut conn).record_download(id).await
    }
}
