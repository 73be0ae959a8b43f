//! Final artifact production from a selected variation.
//!
//! Upscaling is free and idempotent per variation: once a variation has an artifact, asking
//! again returns it without another provider call.

use std::{sync::Arc, time::Duration, time::Instant};

use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    db::{
        Storage,
        errors::DbError,
        models::variations::{ArtifactCreateDBRequest, ArtifactDBResponse, VariationDBResponse},
    },
    errors::{Error, Result},
    metrics,
    providers::{UpscaleProvider, UpscaleRequest, with_deadline},
    types::{AccountId, VariationId, abbrev_uuid},
};

#[derive(Clone)]
pub struct UpscaleCoordinator {
    storage: Arc<dyn Storage>,
    upscaler: Arc<dyn UpscaleProvider>,
    upscale_timeout: Duration,
}

impl UpscaleCoordinator {
    pub fn new(storage: Arc<dyn Storage>, upscaler: Arc<dyn UpscaleProvider>, upscale_timeout: Duration) -> Self {
        Self {
            storage,
            upscaler,
            upscale_timeout,
        }
    }

    /// Select the variation published at `url` (owned by `account_id`) and upscale it
    #[instrument(skip(self), fields(account = %abbrev_uuid(&account_id)), err)]
    pub async fn select_and_upscale(&self, account_id: AccountId, url: &str) -> Result<ArtifactDBResponse> {
        let variation = self
            .storage
            .get_variation_by_url(url)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Variation".to_string(),
                id: url.to_string(),
            })?;
        self.ensure_owner(&variation, account_id).await?;

        self.storage.select_variation(variation.id).await?;
        self.upscale(variation.id).await
    }

    /// Upscale a selected variation, or return the artifact it already has
    #[instrument(skip(self), fields(variation = %abbrev_uuid(&variation_id)), err)]
    pub async fn upscale(&self, variation_id: VariationId) -> Result<ArtifactDBResponse> {
        let variation = self.storage.get_variation(variation_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Variation".to_string(),
            id: variation_id.to_string(),
        })?;

        if !variation.is_selected {
            return Err(Error::Validation {
                message: format!("Variation {variation_id} must be selected before it can be upscaled"),
            });
        }

        if let Some(existing) = self.storage.get_artifact_for_variation(variation_id).await? {
            info!(artifact = %abbrev_uuid(&existing.id), "Variation already upscaled");
            return Ok(existing);
        }

        let job = self.storage.get_job(variation.job_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Job".to_string(),
            id: variation.job_id.to_string(),
        })?;

        let started = Instant::now();
        let result = with_deadline(
            self.upscaler.name(),
            self.upscale_timeout,
            self.upscaler.upscale(&UpscaleRequest::new(&variation.url)),
        )
        .await;
        metrics::jobs::record_provider_call(
            self.upscaler.name(),
            "upscale",
            if result.is_ok() { "ok" } else { "error" },
            started.elapsed().as_secs_f64(),
        );
        let upscaled_url = result?;

        let artifact = self
            .storage
            .create_artifact(&ArtifactCreateDBRequest {
                id: Uuid::new_v4(),
                image_reference: job.source_image,
                variation_id,
                upscaled_url,
            })
            .await
            .map_err(|e| match e {
                // Selection moved to another variation while the provider was running
                DbError::Conflict { .. } => Error::Validation {
                    message: format!("Variation {variation_id} is no longer selected"),
                },
                other => other.into(),
            })?;

        info!(artifact = %abbrev_uuid(&artifact.id), "Created final artifact");
        Ok(artifact)
    }

    /// Variations of other accounts' jobs are reported as missing
    async fn ensure_owner(&self, variation: &VariationDBResponse, account_id: AccountId) -> Result<()> {
        match self.storage.get_job(variation.job_id).await? {
            Some(job) if job.account_id == account_id => Ok(()),
            _ => Err(Error::NotFound {
                resource: "Variation".to_string(),
                id: variation.url.clone(),
            }),
        }
    }
}
