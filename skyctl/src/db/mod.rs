//! Persistence for accounts, the credit ledger, jobs, variations and final artifacts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Ledger / Orchestrator / ...  │
//! └──────────────┬───────────────┘
//!                │  Arc<dyn Storage>
//!                ↓
//! ┌──────────────────────────────┐
//! │           Storage            │
//! └───────┬──────────────┬───────┘
//!         │              │
//!         ↓              ↓
//! ┌──────────────┐ ┌─────────────┐
//! │  PgStorage   │ │  InMemory   │
//! │ (handlers/*) │ │  Storage    │
//! └──────┬───────┘ └─────────────┘
//!        ↓
//! ┌──────────────┐
//! │  PostgreSQL  │
//! └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Postgres repositories, one per area of the schema
//! - [`models`]: Record structures matching table schemas
//! - [`errors`]: Storage error types
//! - [`postgres`]: [`Storage`] over a connection pool
//! - [`in_memory`]: [`Storage`] over process memory, for development and tests
//!
//! # Atomicity
//!
//! Every method is a single atomic unit. In particular:
//!
//! - [`Storage::debit`] never lets a balance go below zero, regardless of concurrency
//! - [`Storage::credit`] applies a given `payment_reference` at most once
//! - [`Storage::complete_job`] records the status change and all variations together
//! - [`Storage::select_variation`] leaves at most one selected variation per job
//!
//! # Migrations
//!
//! Migrations live in the `migrations/` directory and run on startup through
//! [`crate::migrator`]:
//!
//! ```ignore
//! skyctl::migrator().run(&pool).await?;
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{AccountId, ArtifactId, JobId, VariationId};
use errors::Result;
use models::{
    accounts::{AccountCreateDBRequest, AccountDBResponse},
    credits::{CreditDBRequest, CreditOutcome, TransactionDBResponse},
    jobs::{JobCreateDBRequest, JobDBResponse},
    variations::{ArtifactCreateDBRequest, ArtifactDBResponse, VariationDBResponse},
};

pub mod errors;
pub mod handlers;
pub mod in_memory;
pub mod models;
pub mod postgres;

#[cfg(test)]
mod tests;

pub use in_memory::InMemoryStorage;
pub use postgres::PgStorage;

#[async_trait]
pub trait Storage: Send + Sync {
    // Accounts

    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse>;

    async fn get_account(&self, id: AccountId) -> Result<Option<AccountDBResponse>>;

    /// Store the payment processor's customer id unless one is already stored.
    /// Returns whether anything changed.
    ///
    /// # Errors
    /// - `NotFound` if the account doesn't exist
    async fn link_payment_customer(&self, id: AccountId, customer_id: &str) -> Result<bool>;

    // Ledger

    /// Atomically subtract `amount` from the balance if it covers it.
    ///
    /// Returns the new balance, or `None` when the balance is insufficient.
    ///
    /// # Errors
    /// - `NotFound` if the account doesn't exist
    async fn debit(&self, account_id: AccountId, amount: i64) -> Result<Option<i64>>;

    /// Atomically record a transaction and add its credits to the balance.
    ///
    /// Returns [`CreditOutcome::Duplicate`] without changing anything when a transaction
    /// with the same `payment_reference` already exists.
    ///
    /// # Errors
    /// - `NotFound` if the account doesn't exist
    async fn credit(&self, request: &CreditDBRequest) -> Result<CreditOutcome>;

    /// Transactions for an account, newest first
    async fn list_transactions(&self, account_id: AccountId, skip: i64, limit: i64) -> Result<Vec<TransactionDBResponse>>;

    // Jobs

    /// Create a job in `pending` status
    async fn create_job(&self, request: &JobCreateDBRequest) -> Result<JobDBResponse>;

    async fn get_job(&self, id: JobId) -> Result<Option<JobDBResponse>>;

    /// # Errors
    /// - `Conflict` unless the job is `pending`
    async fn mark_job_processing(&self, id: JobId) -> Result<JobDBResponse>;

    /// Mark a job `completed`, store its provider cost and insert one variation per URL
    /// (positions follow the order of `urls`).
    ///
    /// # Errors
    /// - `Conflict` unless the job is `processing`
    async fn complete_job(&self, id: JobId, provider_cost: Decimal, urls: &[String]) -> Result<(JobDBResponse, Vec<VariationDBResponse>)>;

    /// # Errors
    /// - `Conflict` if the job already reached a terminal status
    async fn fail_job(&self, id: JobId, error_message: &str) -> Result<JobDBResponse>;

    // Variations

    /// Variations of a job ordered by position
    async fn list_variations(&self, job_id: JobId) -> Result<Vec<VariationDBResponse>>;

    async fn get_variation(&self, id: VariationId) -> Result<Option<VariationDBResponse>>;

    async fn get_variation_by_url(&self, url: &str) -> Result<Option<VariationDBResponse>>;

    /// Mark a variation as its job's selection, clearing any other selection in that job
    ///
    /// # Errors
    /// - `NotFound` if the variation doesn't exist
    async fn select_variation(&self, id: VariationId) -> Result<VariationDBResponse>;

    // Final artifacts

    async fn get_artifact(&self, id: ArtifactId) -> Result<Option<ArtifactDBResponse>>;

    async fn get_artifact_for_variation(&self, variation_id: VariationId) -> Result<Option<ArtifactDBResponse>>;

    /// Create the artifact for a selected variation, or return the one it already has
    ///
    /// # Errors
    /// - `NotFound` if the variation doesn't exist
    /// - `Conflict` if the variation isn't selected
    async fn create_artifact(&self, request: &ArtifactCreateDBRequest) -> Result<ArtifactDBResponse>;

    /// Increment an artifact's download counter
    ///
    /// # Errors
    /// - `NotFound` if the artifact doesn't exist
    async fn record_download(&self, id: ArtifactId) -> Result<ArtifactDBResponse>;
}
