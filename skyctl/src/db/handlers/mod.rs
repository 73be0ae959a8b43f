//! Postgres repositories.
//!
//! Each repository wraps a borrowed `PgConnection` (a pooled connection or an open transaction)
//! and owns the SQL for one area of the schema. They are composed into the [`Storage`]
//! implementation in [`crate::db::postgres`].
//!
//! - [`Accounts`]: Account creation and payment customer linkage
//! - [`Credits`]: Conditional debits, idempotent credits and the transaction log
//! - [`Jobs`]: Enhancement job lifecycle with guarded status transitions
//! - [`Variations`]: Variation selection and final artifacts
//!
//! # Common Pattern
//!
//! ```ignore
//! use skyctl::db::handlers::Credits;
//!
//! async fn example(pool: &sqlx::PgPool, account_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let balance = Credits::new(&mut conn).debit(account_id, 1).await?;
//!     Ok(())
//! }
//! ```
//!
//! [`Storage`]: crate::db::Storage

pub mod accounts;
pub mod credits;
pub mod jobs;
pub mod variations;

pub use accounts::Accounts;
pub use credits::Credits;
pub use jobs::Jobs;
pub use variations::Variations;
