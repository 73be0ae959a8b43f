//! HTTP handlers for job inspection, variation selection and artifact downloads.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::jobs::{ArtifactResponse, JobResponse, VariationResponse},
    db::errors::DbError,
    errors::{Error, ErrorBody, Result},
    types::{ArtifactId, JobId, VariationId},
};

/// Get a job with its variations
#[utoipa::path(
    get,
    path = "/jobs/{job_id}",
    tag = "jobs",
    summary = "Get a job",
    params(
        ("job_id" = String, Path, description = "Job ID", format = "uuid"),
    ),
    responses(
        (status = 200, description = "Job details with variations in position order", body = JobResponse),
        (status = 404, description = "Job not found", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<JobId>) -> Result<Json<JobResponse>> {
    let job = state.storage.get_job(job_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Job".to_string(),
        id: job_id.to_string(),
    })?;
    let variations = state.storage.list_variations(job_id).await?;
    Ok(Json(JobResponse::new(job, variations)))
}

/// Select a variation
#[utoipa::path(
    post,
    path = "/variations/{variation_id}/select",
    tag = "jobs",
    summary = "Select a variation",
    description = "Marks the variation as its job's selection, clearing any previous selection on the same job",
    params(
        ("variation_id" = String, Path, description = "Variation ID", format = "uuid"),
    ),
    responses(
        (status = 200, description = "Selected variation", body = VariationResponse),
        (status = 404, description = "Variation not found", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn select_variation(State(state): State<AppState>, Path(variation_id): Path<VariationId>) -> Result<Json<VariationResponse>> {
    let variation = state.storage.select_variation(variation_id).await.map_err(|e| match e {
        DbError::NotFound => Error::NotFound {
            resource: "Variation".to_string(),
            id: variation_id.to_string(),
        },
        other => other.into(),
    })?;
    Ok(Json(variation.into()))
}

/// Record a download of a final artifact
#[utoipa::path(
    post,
    path = "/artifacts/{artifact_id}/downloads",
    tag = "jobs",
    summary = "Record an artifact download",
    description = "Counts a download and returns the artifact; the client then fetches `upscaledUrl`",
    params(
        ("artifact_id" = String, Path, description = "Artifact ID", format = "uuid"),
    ),
    responses(
        (status = 200, description = "Artifact with updated download count", body = ArtifactResponse),
        (status = 404, description = "Artifact not found", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn record_download(State(state): State<AppState>, Path(artifact_id): Path<ArtifactId>) -> Result<Json<ArtifactResponse>> {
    let artifact = state.storage.record_download(artifact_id).await.map_err(|e| match e {
        DbError::NotFound => Error::NotFound {
            resource: "Artifact".to_string(),
            id: artifact_id.to_string(),
        },
        other => other.into(),
    })?;
    Ok(Json(artifact.into()))
}
