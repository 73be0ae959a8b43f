//! Database models for job variations and upscaled final artifacts.

use crate::types::{ArtifactId, JobId, VariationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database response for a variation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VariationDBResponse {
    pub id: VariationId,
    pub job_id: JobId,
    pub position: i32,
    pub url: String,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
}

/// Database request for creating a final artifact from a selected variation
#[derive(Debug, Clone)]
pub struct ArtifactCreateDBRequest {
    pub id: ArtifactId,
    pub image_reference: String,
    pub variation_id: VariationId,
    pub upscaled_url: String,
}

/// Database response for a final artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ArtifactDBResponse {
    pub id: ArtifactId,
    pub image_reference: String,
    pub variation_id: VariationId,
    pub upscaled_url: String,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
}
