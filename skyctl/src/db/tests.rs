//! Behavioural tests shared by every [`Storage`] implementation.
//!
//! Each scenario is a generic `run_test_*` function, exercised against [`InMemoryStorage`]
//! always and against [`PgStorage`] with the `postgres-tests` feature.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    InMemoryStorage, Storage,
    errors::DbError,
    models::{
        accounts::AccountCreateDBRequest,
        credits::{CreditDBRequest, CreditOutcome, TransactionKind},
        jobs::{JobCreateDBRequest, JobStatus},
        variations::ArtifactCreateDBRequest,
    },
};
use crate::types::{AccountId, JobId};

#[cfg(feature = "postgres-tests")]
use super::PgStorage;

async fn account_with<S: Storage>(storage: &S, credits: i64) -> AccountId {
    storage.create_account(&AccountCreateDBRequest::new(credits)).await.unwrap().id
}

async fn processing_job<S: Storage>(storage: &S, account_id: AccountId) -> JobId {
    let id = Uuid::new_v4();
    storage
        .create_job(&JobCreateDBRequest {
            id,
            account_id,
            source_image: "https://img.example.com/house.jpg".to_string(),
            prompt: "test prompt".to_string(),
            preset_used: "blue_sky".to_string(),
            provider: "dummy".to_string(),
            credits_charged: 1,
        })
        .await
        .unwrap();
    storage.mark_job_processing(id).await.unwrap();
    id
}

fn four_urls() -> Vec<String> {
    (0..4).map(|i| format!("https://cdn.example.com/{}/{i}.webp", Uuid::new_v4())).collect()
}

async fn run_test_debit_never_goes_negative<S: Storage>(storage: &S) {
    let account = account_with(storage, 2).await;

    assert_eq!(storage.debit(account, 1).await.unwrap(), Some(1));
    assert_eq!(storage.debit(account, 1).await.unwrap(), Some(0));
    assert_eq!(storage.debit(account, 1).await.unwrap(), None);

    let account = storage.get_account(account).await.unwrap().unwrap();
    assert_eq!(account.credits, 0);
}

async fn run_test_debit_unknown_account<S: Storage>(storage: &S) {
    let result = storage.debit(Uuid::new_v4(), 1).await;
    assert!(matches!(result, Err(DbError::NotFound)));
}

async fn run_test_concurrent_debits_on_last_credit<S: Storage + 'static>(storage: Arc<S>) {
    let account = account_with(storage.as_ref(), 1).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let storage = storage.clone();
            tokio::spawn(async move { storage.debit(account, 1).await.unwrap() })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let successes = results.into_iter().filter(|r| matches!(r, Ok(Some(_)))).count();

    assert_eq!(successes, 1);
    assert_eq!(storage.get_account(account).await.unwrap().unwrap().credits, 0);
}

async fn run_test_credit_is_idempotent_by_reference<S: Storage>(storage: &S) {
    let account = account_with(storage, 0).await;
    let reference = format!("pi_{}", Uuid::new_v4().simple());
    let request = CreditDBRequest::purchase(account, 10, Decimal::new(999, 2), reference.clone());

    let first = storage.credit(&request).await.unwrap();
    match &first {
        CreditOutcome::Applied { balance, transaction } => {
            assert_eq!(*balance, 10);
            assert_eq!(transaction.kind, TransactionKind::Purchase);
            assert_eq!(transaction.amount_paid, Decimal::new(999, 2));
            assert_eq!(transaction.payment_reference, reference);
        }
        other => panic!("expected applied credit, got {other:?}"),
    }

    let second = storage.credit(&request).await.unwrap();
    assert_eq!(second, CreditOutcome::Duplicate { balance: 10 });

    let transactions = storage.list_transactions(account, 0, 100).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(storage.get_account(account).await.unwrap().unwrap().credits, 10);
}

async fn run_test_credit_unknown_account<S: Storage>(storage: &S) {
    let request = CreditDBRequest::purchase(Uuid::new_v4(), 5, Decimal::new(500, 2), "pi_orphan");
    let result = storage.credit(&request).await;
    assert!(matches!(result, Err(DbError::NotFound)));
}

async fn run_test_transactions_listed_newest_first<S: Storage>(storage: &S) {
    let account = account_with(storage, 0).await;
    let job_id = Uuid::new_v4();

    storage
        .credit(&CreditDBRequest::purchase(account, 5, Decimal::new(500, 2), format!("pi_{}", Uuid::new_v4())))
        .await
        .unwrap();
    storage.credit(&CreditDBRequest::job_refund(account, job_id, 1)).await.unwrap();

    let transactions = storage.list_transactions(account, 0, 10).await.unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0].kind, TransactionKind::Refund);
    assert_eq!(transactions[1].kind, TransactionKind::Purchase);

    let page = storage.list_transactions(account, 1, 10).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].kind, TransactionKind::Purchase);
}

async fn run_test_link_payment_customer_keeps_first<S: Storage>(storage: &S) {
    let account = account_with(storage, 0).await;

    assert!(storage.link_payment_customer(account, "cus_first").await.unwrap());
    assert!(!storage.link_payment_customer(account, "cus_second").await.unwrap());

    let account = storage.get_account(account).await.unwrap().unwrap();
    assert_eq!(account.payment_customer_id.as_deref(), Some("cus_first"));

    let missing = storage.link_payment_customer(Uuid::new_v4(), "cus_x").await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}

async fn run_test_job_lifecycle_with_variations<S: Storage>(storage: &S) {
    let account = account_with(storage, 1).await;
    let job_id = processing_job(storage, account).await;
    let urls = four_urls();

    let (job, variations) = storage.complete_job(job_id, Decimal::new(100, 4), &urls).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.provider_cost, Decimal::new(100, 4));
    assert!(job.completed_at.is_some());
    assert_eq!(variations.len(), 4);

    let listed = storage.list_variations(job_id).await.unwrap();
    let listed_urls: Vec<_> = listed.iter().map(|v| v.url.clone()).collect();
    assert_eq!(listed_urls, urls);
    assert!(listed.iter().all(|v| !v.is_selected));
    assert_eq!(listed.iter().map(|v| v.position).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}

async fn run_test_terminal_jobs_cannot_move<S: Storage>(storage: &S) {
    let account = account_with(storage, 1).await;
    let job_id = processing_job(storage, account).await;

    let failed = storage.fail_job(job_id, "provider timed out").await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("provider timed out"));

    let completed = storage.complete_job(job_id, Decimal::ZERO, &four_urls()).await;
    assert!(matches!(completed, Err(DbError::Conflict { .. })));

    let refailed = storage.fail_job(job_id, "again").await;
    assert!(matches!(refailed, Err(DbError::Conflict { .. })));

    let processing = storage.mark_job_processing(job_id).await;
    assert!(matches!(processing, Err(DbError::Conflict { .. })));

    assert!(storage.list_variations(job_id).await.unwrap().is_empty());
    let job = storage.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

async fn run_test_pending_job_cannot_complete<S: Storage>(storage: &S) {
    let account = account_with(storage, 1).await;
    let id = Uuid::new_v4();
    storage
        .create_job(&JobCreateDBRequest {
            id,
            account_id: account,
            source_image: "https://img.example.com/a.jpg".to_string(),
            prompt: "p".to_string(),
            preset_used: "sunset".to_string(),
            provider: "dummy".to_string(),
            credits_charged: 1,
        })
        .await
        .unwrap();

    let result = storage.complete_job(id, Decimal::ZERO, &four_urls()).await;
    assert!(matches!(result, Err(DbError::Conflict { .. })));

    let missing = storage.mark_job_processing(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}

async fn run_test_selection_is_exclusive<S: Storage>(storage: &S) {
    let account = account_with(storage, 1).await;
    let job_id = processing_job(storage, account).await;
    let (_, variations) = storage.complete_job(job_id, Decimal::ZERO, &four_urls()).await.unwrap();

    storage.select_variation(variations[0].id).await.unwrap();
    let selected = storage.select_variation(variations[2].id).await.unwrap();
    assert!(selected.is_selected);

    let listed = storage.list_variations(job_id).await.unwrap();
    let selected: Vec<_> = listed.iter().filter(|v| v.is_selected).map(|v| v.id).collect();
    assert_eq!(selected, vec![variations[2].id]);

    let by_url = storage.get_variation_by_url(&variations[2].url).await.unwrap().unwrap();
    assert_eq!(by_url.id, variations[2].id);

    let missing = storage.select_variation(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}

async fn run_test_artifacts_require_selection_and_are_unique<S: Storage>(storage: &S) {
    let account = account_with(storage, 1).await;
    let job_id = processing_job(storage, account).await;
    let (_, variations) = storage.complete_job(job_id, Decimal::ZERO, &four_urls()).await.unwrap();
    let variation = &variations[1];

    let request = ArtifactCreateDBRequest {
        id: Uuid::new_v4(),
        image_reference: "https://img.example.com/house.jpg".to_string(),
        variation_id: variation.id,
        upscaled_url: "https://cdn.example.com/upscaled.png".to_string(),
    };

    let unselected = storage.create_artifact(&request).await;
    assert!(matches!(unselected, Err(DbError::Conflict { .. })));

    storage.select_variation(variation.id).await.unwrap();
    let artifact = storage.create_artifact(&request).await.unwrap();
    assert_eq!(artifact.download_count, 0);

    let again = storage
        .create_artifact(&ArtifactCreateDBRequest {
            id: Uuid::new_v4(),
            upscaled_url: "https://cdn.example.com/other.png".to_string(),
            ..request.clone()
        })
        .await
        .unwrap();
    assert_eq!(again.id, artifact.id);
    assert_eq!(again.upscaled_url, artifact.upscaled_url);

    let fetched = storage.get_artifact_for_variation(variation.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, artifact.id);

    storage.record_download(artifact.id).await.unwrap();
    let downloaded = storage.record_download(artifact.id).await.unwrap();
    assert_eq!(downloaded.download_count, 2);

    let missing = storage.record_download(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}

macro_rules! storage_tests {
    ($($name:ident),* $(,)?) => {
        mod in_memory {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let storage = InMemoryStorage::new();
                    super::$name(&storage).await;
                }
            )*
        }

        #[cfg(feature = "postgres-tests")]
        mod postgres {
            use super::*;
            $(
                #[sqlx::test]
                async fn $name(pool: sqlx::PgPool) {
                    let storage = PgStorage::new(pool);
                    super::$name(&storage).await;
                }
            )*
        }
    };
}

storage_tests!(
    run_test_debit_never_goes_negative,
    run_test_debit_unknown_account,
    run_test_credit_is_idempotent_by_reference,
    run_test_credit_unknown_account,
    run_test_transactions_listed_newest_first,
    run_test_link_payment_customer_keeps_first,
    run_test_job_lifecycle_with_variations,
    run_test_terminal_jobs_cannot_move,
    run_test_pending_job_cannot_complete,
    run_test_selection_is_exclusive,
    run_test_artifacts_require_selection_and_are_unique,
);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_on_last_credit_in_memory() {
    run_test_concurrent_debits_on_last_credit(Arc::new(InMemoryStorage::new())).await;
}

#[cfg(feature = "postgres-tests")]
#[sqlx::test]
async fn test_concurrent_debits_on_last_credit_postgres(pool: sqlx::PgPool) {
    run_test_concurrent_debits_on_last_credit(Arc::new(PgStorage::new(pool))).await;
}
