//! API response models for jobs, variations and final artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::models::{
        jobs::{JobDBResponse, JobStatus},
        variations::{ArtifactDBResponse, VariationDBResponse},
    },
    types::{AccountId, ArtifactId, JobId, VariationId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: VariationId,
    #[schema(value_type = String, format = "uuid")]
    pub job_id: JobId,
    pub position: i32,
    pub url: String,
    pub is_selected: bool,
}

impl From<VariationDBResponse> for VariationResponse {
    fn from(db: VariationDBResponse) -> Self {
        Self {
            id: db.id,
            job_id: db.job_id,
            position: db.position,
            url: db.url,
            is_selected: db.is_selected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: JobId,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    pub status: JobStatus,
    pub source_image: String,
    pub prompt: String,
    pub preset_used: String,
    pub credits_charged: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub variations: Vec<VariationResponse>,
}

impl JobResponse {
    pub fn new(job: JobDBResponse, variations: Vec<VariationDBResponse>) -> Self {
        Self {
            id: job.id,
            account_id: job.account_id,
            status: job.status,
            source_image: job.source_image,
            prompt: job.prompt,
            preset_used: job.preset_used,
            credits_charged: job.credits_charged,
            error_message: job.error_message,
            created_at: job.created_at,
            completed_at: job.completed_at,
            variations: variations.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ArtifactId,
    #[schema(value_type = String, format = "uuid")]
    pub variation_id: VariationId,
    pub image_reference: String,
    pub upscaled_url: String,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ArtifactDBResponse> for ArtifactResponse {
    fn from(db: ArtifactDBResponse) -> Self {
        Self {
            id: db.id,
            variation_id: db.variation_id,
            image_reference: db.image_reference,
            upscaled_url: db.upscaled_url,
            download_count: db.download_count,
            created_at: db.created_at,
        }
    }
}
