//! Enhancement job orchestration.
//!
//! One call to [`JobOrchestrator::enhance`] is one charged job:
//!
//! ```text
//! validate ─→ build prompt ─→ debit 1 ─→ job pending ─→ processing ─→ generate (deadline)
//!                                                                          │
//!                                      ┌───────────────────────────────────┴──┐
//!                                      ↓                                      ↓
//!                       completed + 4 variations                 failed + refund (keyed by job id)
//! ```
//!
//! Nothing is charged before the prompt is known to be valid, and every failure after the
//! debit is recorded on the job and compensated exactly once.

use std::{sync::Arc, time::Duration, time::Instant};

use rust_decimal::Decimal;
use tracing::{Instrument, error, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::{
    db::{
        Storage,
        errors::DbError,
        models::{jobs::JobCreateDBRequest, variations::VariationDBResponse},
    },
    errors::{Error, Result},
    ledger::CreditLedger,
    metrics,
    prompt::{self, SkyPreset},
    providers::{GenerationProvider, GenerationRequest, ProviderError, with_deadline},
    types::{AccountId, JobId, abbrev_uuid},
};

/// Credits charged for one enhancement
pub const CREDITS_PER_JOB: i64 = 1;

/// An enhancement request as received from a client, before validation
#[derive(Debug, Clone, Default)]
pub struct EnhanceCommand {
    pub account_id: Option<String>,
    pub source_image: Option<String>,
    pub sky_selection: Option<String>,
    pub enhancement_selections: Vec<String>,
    pub free_text: Option<String>,
}

/// A validated enhancement request with its resolved prompt
#[derive(Debug, Clone, PartialEq)]
struct PreparedJob {
    account_id: AccountId,
    source_image: String,
    sky: SkyPreset,
    prompt: String,
}

impl EnhanceCommand {
    fn prepare(self) -> Result<PreparedJob> {
        let account_id = required(self.account_id, "accountId")?;
        let account_id = Uuid::parse_str(&account_id).map_err(|_| Error::Validation {
            message: format!("accountId '{account_id}' is not a valid UUID"),
        })?;
        let source_image = required(self.source_image, "sourceImage")?;
        let sky: SkyPreset = required(self.sky_selection, "skySelection")?.parse()?;
        let enhancements = prompt::parse_enhancements(&self.enhancement_selections)?;

        let prompt = prompt::build(sky, &enhancements, self.free_text.as_deref().unwrap_or_default());

        Ok(PreparedJob {
            account_id,
            source_image,
            sky,
            prompt,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Validation {
            message: format!("{field} is required"),
        }),
    }
}

/// Result of a completed enhancement
#[derive(Debug, Clone)]
pub struct EnhancementOutcome {
    pub job_id: JobId,
    pub variations: Vec<VariationDBResponse>,
    pub credits_remaining: i64,
}

#[derive(Clone)]
pub struct JobOrchestrator {
    storage: Arc<dyn Storage>,
    ledger: CreditLedger,
    generator: Arc<dyn GenerationProvider>,
    generation_timeout: Duration,
}

impl JobOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        ledger: CreditLedger,
        generator: Arc<dyn GenerationProvider>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            ledger,
            generator,
            generation_timeout,
        }
    }

    /// Validate, charge and run one enhancement job.
    ///
    /// Charging and the job both run on their own task, so dropping the returned future (e.g.
    /// the client disconnecting) never leaves a debit without its job or refund.
    #[instrument(skip_all, err)]
    pub async fn enhance(&self, command: EnhanceCommand) -> Result<EnhancementOutcome> {
        let job = command.prepare()?;

        let job_id = Uuid::new_v4();
        let span = info_span!("enhancement_job", job = %abbrev_uuid(&job_id), account = %abbrev_uuid(&job.account_id));
        let orchestrator = self.clone();
        let handle = tokio::spawn(async move { orchestrator.run(job_id, job).await }.instrument(span));

        handle
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("enhancement job {job_id} task failed: {e}")))?
    }

    async fn run(&self, job_id: JobId, job: PreparedJob) -> Result<EnhancementOutcome> {
        let account_id = job.account_id;
        let balance = self.ledger.debit(account_id, CREDITS_PER_JOB).await?;
        match self.execute(job_id, job).await {
            Ok(variations) => {
                metrics::jobs::record_job_finished("completed");
                info!(variations = variations.len(), "Enhancement job completed");
                Ok(EnhancementOutcome {
                    job_id,
                    variations,
                    credits_remaining: balance,
                })
            }
            Err(err) => Err(self.compensate(job_id, account_id, err).await),
        }
    }

    async fn execute(&self, job_id: JobId, job: PreparedJob) -> Result<Vec<VariationDBResponse>> {
        self.storage
            .create_job(&JobCreateDBRequest {
                id: job_id,
                account_id: job.account_id,
                source_image: job.source_image.clone(),
                prompt: job.prompt.clone(),
                preset_used: job.sky.key().to_string(),
                provider: self.generator.name().to_string(),
                credits_charged: CREDITS_PER_JOB,
            })
            .await?;
        self.storage.mark_job_processing(job_id).await?;

        let request = GenerationRequest::new(job.prompt, job.source_image);
        let started = Instant::now();
        let result = with_deadline(self.generator.name(), self.generation_timeout, self.generator.generate(&request)).await;
        metrics::jobs::record_provider_call(
            self.generator.name(),
            "generate",
            if result.is_ok() { "ok" } else { "error" },
            started.elapsed().as_secs_f64(),
        );
        let urls = result?;

        if urls.len() != GenerationRequest::OUTPUT_COUNT {
            return Err(ProviderError::MalformedOutput {
                provider: self.generator.name().to_string(),
                message: format!("expected {} outputs, got {}", GenerationRequest::OUTPUT_COUNT, urls.len()),
            }
            .into());
        }

        let cost = self.generator.cost_per_output() * Decimal::from(urls.len());
        let (_, variations) = self.storage.complete_job(job_id, cost, &urls).await?;
        Ok(variations)
    }

    /// Mark the job failed and reverse its debit, returning the error to report
    async fn compensate(&self, job_id: JobId, account_id: AccountId, err: Error) -> Error {
        warn!(error = %err, "Enhancement job failed, refunding");
        metrics::jobs::record_job_finished("failed");

        match self.storage.fail_job(job_id, &err.to_string()).await {
            Ok(_) => {}
            // The job row was never written
            Err(DbError::NotFound) => {}
            Err(e) => error!(error = %e, "Failed to record job failure"),
        }

        let credits_remaining = match self.ledger.refund_job(account_id, job_id, CREDITS_PER_JOB).await {
            Ok(outcome) => Some(outcome.balance()),
            Err(e) => {
                error!(error = %e, "Failed to refund enhancement job");
                None
            }
        };

        Error::JobFailed {
            job_id,
            credits_remaining,
            source: Box::new(err),
        }
    }
}
