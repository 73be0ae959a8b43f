//! API request/response models for enhancement and upscaling.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::models::variations::ArtifactDBResponse,
    orchestrator::{EnhanceCommand, EnhancementOutcome},
    types::{ArtifactId, JobId, VariationId},
};

/// Enhancement request. Every field is optional on the wire so that missing values are
/// reported as validation errors rather than body rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct EnhanceRequest {
    /// Reference (URL) of the photo to enhance
    pub source_image: Option<String>,
    /// Sky preset key, see `GET /options`
    pub sky_selection: Option<String>,
    /// Enhancement keys, see `GET /options`; `null` means none
    pub enhancement_selections: Option<Vec<String>>,
    /// Extra instructions appended to the prompt
    pub free_text: Option<String>,
    /// Account to charge
    pub account_id: Option<String>,
}

impl From<EnhanceRequest> for EnhanceCommand {
    fn from(request: EnhanceRequest) -> Self {
        EnhanceCommand {
            account_id: request.account_id,
            source_image: request.source_image,
            sky_selection: request.sky_selection,
            enhancement_selections: request.enhancement_selections.unwrap_or_default(),
            free_text: request.free_text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub job_id: JobId,
    /// The four candidate images, in provider order
    pub variations: Vec<String>,
    pub credits_remaining: i64,
}

impl From<EnhancementOutcome> for EnhanceResponse {
    fn from(outcome: EnhancementOutcome) -> Self {
        Self {
            job_id: outcome.job_id,
            variations: outcome.variations.into_iter().map(|v| v.url).collect(),
            credits_remaining: outcome.credits_remaining,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpscaleRequest {
    /// URL of one of the job's variations; it becomes the job's selection
    pub variation_url: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpscaleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub artifact_id: ArtifactId,
    #[schema(value_type = String, format = "uuid")]
    pub variation_id: VariationId,
    pub upscaled_url: String,
}

impl From<ArtifactDBResponse> for UpscaleResponse {
    fn from(artifact: ArtifactDBResponse) -> Self {
        Self {
            artifact_id: artifact.id,
            variation_id: artifact.variation_id,
            upscaled_url: artifact.upscaled_url,
        }
    }
}
