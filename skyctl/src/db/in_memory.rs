//! In-memory [`Storage`].
//!
//! All state sits behind one mutex, so every trait method is trivially atomic. Suitable for
//! development and tests; everything is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::{
    Storage,
    errors::{DbError, Result},
    models::{
        accounts::{AccountCreateDBRequest, AccountDBResponse},
        credits::{CreditDBRequest, CreditOutcome, TransactionDBResponse},
        jobs::{JobCreateDBRequest, JobDBResponse, JobStatus},
        variations::{ArtifactCreateDBRequest, ArtifactDBResponse, VariationDBResponse},
    },
};
use crate::types::{AccountId, ArtifactId, JobId, TransactionId, VariationId};

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, AccountDBResponse>,
    transactions: Vec<TransactionDBResponse>,
    jobs: HashMap<JobId, JobDBResponse>,
    variations: HashMap<VariationId, VariationDBResponse>,
    artifacts: HashMap<ArtifactId, ArtifactDBResponse>,
}

impl State {
    fn account_mut(&mut self, id: AccountId) -> Result<&mut AccountDBResponse> {
        self.accounts.get_mut(&id).ok_or(DbError::NotFound)
    }

    fn transition(&mut self, id: JobId, next: JobStatus) -> Result<&mut JobDBResponse> {
        let job = self.jobs.get_mut(&id).ok_or(DbError::NotFound)?;
        if !job.status.can_transition_to(next) {
            return Err(DbError::Conflict {
                entity_type: "Job".to_string(),
                entity_id: id.to_string(),
                reason: format!("cannot move from {} to {}", job.status.as_str(), next.as_str()),
            });
        }
        job.status = next;
        Ok(job)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<State>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn job_count(&self) -> usize {
        self.state.lock().jobs.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        let mut state = self.state.lock();
        if state.accounts.contains_key(&request.id) {
            return Err(DbError::UniqueViolation {
                constraint: Some("accounts_pkey".to_string()),
                table: Some("accounts".to_string()),
                message: format!("account {} already exists", request.id),
            });
        }
        if request.initial_credits < 0 {
            return Err(DbError::CheckViolation {
                constraint: Some("accounts_credits_non_negative".to_string()),
                table: Some("accounts".to_string()),
                message: "credits must not be negative".to_string(),
            });
        }

        let now = Utc::now();
        let account = AccountDBResponse {
            id: request.id,
            credits: request.initial_credits,
            payment_customer_id: request.payment_customer_id.clone(),
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        Ok(self.state.lock().accounts.get(&id).cloned())
    }

    async fn link_payment_customer(&self, id: AccountId, customer_id: &str) -> Result<bool> {
        let mut state = self.state.lock();
        let account = state.account_mut(id)?;
        if account.payment_customer_id.is_some() {
            return Ok(false);
        }
        account.payment_customer_id = Some(customer_id.to_string());
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn debit(&self, account_id: AccountId, amount: i64) -> Result<Option<i64>> {
        let mut state = self.state.lock();
        let account = state.account_mut(account_id)?;
        if account.credits < amount {
            return Ok(None);
        }
        account.credits -= amount;
        account.updated_at = Utc::now();
        Ok(Some(account.credits))
    }

    async fn credit(&self, request: &CreditDBRequest) -> Result<CreditOutcome> {
        let mut state = self.state.lock();
        let current = state.account_mut(request.account_id)?.credits;

        if state.transactions.iter().any(|t| t.payment_reference == request.payment_reference) {
            return Ok(CreditOutcome::Duplicate { balance: current });
        }
        if request.credits <= 0 {
            return Err(DbError::CheckViolation {
                constraint: Some("transactions_credits_check".to_string()),
                table: Some("transactions".to_string()),
                message: "credits must be positive".to_string(),
            });
        }

        let transaction = TransactionDBResponse {
            id: TransactionId::new_v4(),
            account_id: request.account_id,
            kind: request.kind,
            credits: request.credits,
            amount_paid: request.amount_paid,
            payment_reference: request.payment_reference.clone(),
            description: request.description.clone(),
            created_at: Utc::now(),
        };
        state.transactions.push(transaction.clone());

        let account = state.account_mut(request.account_id)?;
        account.credits += request.credits;
        account.updated_at = Utc::now();

        Ok(CreditOutcome::Applied {
            balance: account.credits,
            transaction,
        })
    }

    async fn list_transactions(&self, account_id: AccountId, skip: i64, limit: i64) -> Result<Vec<TransactionDBResponse>> {
        let state = self.state.lock();
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.account_id == account_id)
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn create_job(&self, request: &JobCreateDBRequest) -> Result<JobDBResponse> {
        let mut state = self.state.lock();
        if !state.accounts.contains_key(&request.account_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("enhancement_jobs_account_id_fkey".to_string()),
                table: Some("enhancement_jobs".to_string()),
                message: format!("account {} does not exist", request.account_id),
            });
        }

        let job = JobDBResponse {
            id: request.id,
            account_id: request.account_id,
            source_image: request.source_image.clone(),
            prompt: request.prompt.clone(),
            preset_used: request.preset_used.clone(),
            provider: request.provider.clone(),
            provider_cost: Decimal::ZERO,
            credits_charged: request.credits_charged,
            status: JobStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<JobDBResponse>> {
        Ok(self.state.lock().jobs.get(&id).cloned())
    }

    async fn mark_job_processing(&self, id: JobId) -> Result<JobDBResponse> {
        let mut state = self.state.lock();
        Ok(state.transition(id, JobStatus::Processing)?.clone())
    }

    async fn complete_job(&self, id: JobId, provider_cost: Decimal, urls: &[String]) -> Result<(JobDBResponse, Vec<VariationDBResponse>)> {
        let mut state = self.state.lock();
        let job = state.transition(id, JobStatus::Completed)?;
        job.provider_cost = provider_cost;
        job.completed_at = Some(Utc::now());
        let job = job.clone();

        let now = Utc::now();
        let variations: Vec<_> = urls
            .iter()
            .enumerate()
            .map(|(position, url)| VariationDBResponse {
                id: VariationId::new_v4(),
                job_id: id,
                position: position as i32,
                url: url.clone(),
                is_selected: false,
                created_at: now,
            })
            .collect();
        for variation in &variations {
            state.variations.insert(variation.id, variation.clone());
        }

        Ok((job, variations))
    }

    async fn fail_job(&self, id: JobId, error_message: &str) -> Result<JobDBResponse> {
        let mut state = self.state.lock();
        let job = state.transition(id, JobStatus::Failed)?;
        job.error_message = Some(error_message.to_string());
        job.completed_at = Some(Utc::now());
        Ok(job.clone())
    }

    async fn list_variations(&self, job_id: JobId) -> Result<Vec<VariationDBResponse>> {
        let state = self.state.lock();
        let mut variations: Vec<_> = state.variations.values().filter(|v| v.job_id == job_id).cloned().collect();
        variations.sort_by_key(|v| v.position);
        Ok(variations)
    }

    async fn get_variation(&self, id: VariationId) -> Result<Option<VariationDBResponse>> {
        Ok(self.state.lock().variations.get(&id).cloned())
    }

    async fn get_variation_by_url(&self, url: &str) -> Result<Option<VariationDBResponse>> {
        let state = self.state.lock();
        Ok(state
            .variations
            .values()
            .filter(|v| v.url == url)
            .min_by_key(|v| (v.created_at, v.position))
            .cloned())
    }

    async fn select_variation(&self, id: VariationId) -> Result<VariationDBResponse> {
        let mut state = self.state.lock();
        let job_id = state.variations.get(&id).ok_or(DbError::NotFound)?.job_id;

        for variation in state.variations.values_mut().filter(|v| v.job_id == job_id) {
            variation.is_selected = variation.id == id;
        }

        state.variations.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn get_artifact(&self, id: ArtifactId) -> Result<Option<ArtifactDBResponse>> {
        Ok(self.state.lock().artifacts.get(&id).cloned())
    }

    async fn get_artifact_for_variation(&self, variation_id: VariationId) -> Result<Option<ArtifactDBResponse>> {
        let state = self.state.lock();
        Ok(state.artifacts.values().find(|a| a.variation_id == variation_id).cloned())
    }

    async fn create_artifact(&self, request: &ArtifactCreateDBRequest) -> Result<ArtifactDBResponse> {
        let mut state = self.state.lock();

        if let Some(existing) = state.artifacts.values().find(|a| a.variation_id == request.variation_id) {
            return Ok(existing.clone());
        }

        let variation = state.variations.get(&request.variation_id).ok_or(DbError::NotFound)?;
        if !variation.is_selected {
            return Err(DbError::Conflict {
                entity_type: "Variation".to_string(),
                entity_id: request.variation_id.to_string(),
                reason: "variation is not selected".to_string(),
            });
        }

        let artifact = ArtifactDBResponse {
            id: request.id,
            image_reference: request.image_reference.clone(),
            variation_id: request.variation_id,
            upscaled_url: request.upscaled_url.clone(),
            download_count: 0,
            created_at: Utc::now(),
        };
        state.artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn record_download(&self, id: ArtifactId) -> Result<ArtifactDBResponse> {
        let mut state = self.state.lock();
        let artifact = state.artifacts.get_mut(&id).ok_or(DbError::NotFound)?;
        artifact.download_count += 1;
        Ok(artifact.clone())
    }
}
