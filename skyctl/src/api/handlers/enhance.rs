//! HTTP handlers for enhancement and upscaling.

use axum::{Json, extract::State, extract::rejection::JsonRejection};

use super::parse_uuid;
use crate::{
    AppState,
    api::models::enhance::{EnhanceRequest, EnhanceResponse, UpscaleRequest, UpscaleResponse},
    errors::{Error, ErrorBody, Result},
};

/// Run one charged enhancement
#[utoipa::path(
    post,
    path = "/enhance",
    tag = "enhance",
    summary = "Enhance a photo",
    description = "Charges one credit and returns four candidate variations. If generation fails after the charge, the job is marked failed and the credit is refunded before responding.",
    request_body = EnhanceRequest,
    responses(
        (status = 200, description = "Job completed", body = EnhanceResponse),
        (status = 400, description = "Malformed body, missing field or unknown option", body = ErrorBody),
        (status = 402, description = "Insufficient credits", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody),
        (status = 500, description = "Generation failed; the body carries jobId and creditsRemaining", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn enhance(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EnhanceRequest>, JsonRejection>,
) -> Result<Json<EnhanceResponse>> {
    let Json(request) = payload?;
    let outcome = state.orchestrator.enhance(request.into()).await?;
    Ok(Json(outcome.into()))
}

/// Select a variation and upscale it
#[utoipa::path(
    post,
    path = "/upscale",
    tag = "enhance",
    summary = "Upscale a variation",
    description = "Marks the variation as its job's selection and produces the final artifact. Free of charge; repeating the call returns the existing artifact.",
    request_body = UpscaleRequest,
    responses(
        (status = 200, description = "Final artifact", body = UpscaleResponse),
        (status = 400, description = "Malformed body, missing or invalid field", body = ErrorBody),
        (status = 404, description = "Unknown variation", body = ErrorBody),
        (status = 500, description = "Upscale failed", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn upscale(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpscaleRequest>, JsonRejection>,
) -> Result<Json<UpscaleResponse>> {
    let Json(request) = payload?;
    let account_id = parse_uuid(request.account_id.as_deref(), "accountId")?;
    let url = request
        .variation_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::Validation {
            message: "variationUrl is required".to_string(),
        })?;

    let artifact = state.upscaler.select_and_upscale(account_id, &url).await?;
    Ok(Json(artifact.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::models::enhance::{EnhanceResponse, UpscaleResponse};
    use crate::db::{Storage, models::jobs::JobStatus};
    use crate::test_utils::{FailingGenerator, StubGenerator, StubUpscaler, create_account, create_test_app, create_test_app_with, create_test_config};

    #[test_log::test(tokio::test)]
    async fn test_enhance_spends_last_credit() {
        let (app, storage) = create_test_app();
        let account = create_account(storage.as_ref(), 1).await;

        let response = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "standard-blue",
                "enhancementSelections": [],
                "freeText": "",
                "accountId": account.to_string()
            }))
            .await;

        response.assert_status_ok();
        let body: EnhanceResponse = response.json();
        assert_eq!(body.credits_remaining, 0);
        assert_eq!(body.variations.len(), 4);

        let job = storage.get_job(body.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(storage.list_variations(body.job_id).await.unwrap().len(), 4);
        assert_eq!(storage.get_account(account).await.unwrap().unwrap().credits, 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_enhance_without_credits_is_payment_required() {
        let (app, storage) = create_test_app();
        let account = create_account(storage.as_ref(), 0).await;

        let response = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "twilight",
                "accountId": account.to_string()
            }))
            .await;

        response.assert_status(StatusCode::PAYMENT_REQUIRED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "insufficient_credits");
        assert_eq!(storage.job_count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_sky_is_rejected_without_charge() {
        let (app, storage) = create_test_app();
        let account = create_account(storage.as_ref(), 2).await;

        let response = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "aurora",
                "accountId": account.to_string()
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "invalid_option");
        assert_eq!(storage.get_account(account).await.unwrap().unwrap().credits, 2);
        assert_eq!(storage.job_count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_source_image_is_bad_request() {
        let (app, storage) = create_test_app();
        let account = create_account(storage.as_ref(), 1).await;

        let response = app
            .post("/enhance")
            .json(&json!({ "skySelection": "twilight", "accountId": account.to_string() }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "validation_error");
    }

    #[test_log::test(tokio::test)]
    async fn test_generation_failure_reports_refund() {
        let (app, storage) = create_test_app_with(create_test_config(), Arc::new(FailingGenerator), Arc::new(StubUpscaler::new()));
        let account = create_account(storage.as_ref(), 1).await;

        let response = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "golden-hour",
                "accountId": account.to_string()
            }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "provider_error");
        assert_eq!(body["creditsRemaining"], 1);
        assert!(body["jobId"].is_string());
        // Upstream details stay in the logs
        assert!(!body["error"].as_str().unwrap().contains("model crashed"));
        assert_eq!(storage.get_account(account).await.unwrap().unwrap().credits, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_generation_timeout_reports_refund() {
        let mut config = create_test_config();
        config.jobs.generation_timeout = Duration::from_millis(20);
        let generator = Arc::new(StubGenerator::new(4).with_delay(Duration::from_secs(10)));
        let (app, storage) = create_test_app_with(config, generator, Arc::new(StubUpscaler::new()));
        let account = create_account(storage.as_ref(), 1).await;

        let response = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "standard-blue",
                "accountId": account.to_string()
            }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "provider_timeout");
        assert_eq!(body["creditsRemaining"], 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_upscale_selects_and_is_idempotent() {
        let upscaler = Arc::new(StubUpscaler::new());
        let (app, storage) = create_test_app_with(create_test_config(), Arc::new(StubGenerator::new(4)), upscaler.clone());
        let account = create_account(storage.as_ref(), 1).await;

        let enhanced: EnhanceResponse = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "blue-with-clouds",
                "enhancementSelections": ["remove-cars"],
                "accountId": account.to_string()
            }))
            .await
            .json();

        let request = json!({ "variationUrl": enhanced.variations[2], "accountId": account.to_string() });
        let first = app.post("/upscale").json(&request).await;
        first.assert_status_ok();
        let first: UpscaleResponse = first.json();
        let second: UpscaleResponse = app.post("/upscale").json(&request).await.json();

        assert_eq!(first.artifact_id, second.artifact_id);
        assert_eq!(upscaler.calls(), 1);
        let variation = storage.get_variation(first.variation_id).await.unwrap().unwrap();
        assert!(variation.is_selected);
        assert_eq!(variation.url, enhanced.variations[2]);
        // Upscaling is free
        assert_eq!(storage.get_account(account).await.unwrap().unwrap().credits, 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_upscale_unknown_variation_is_not_found() {
        let (app, storage) = create_test_app();
        let account = create_account(storage.as_ref(), 0).await;

        let response = app
            .post("/upscale")
            .json(&json!({ "variationUrl": "https://cdn.example.com/missing.webp", "accountId": account.to_string() }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_upscale_requires_fields() {
        let (app, _storage) = create_test_app();

        let response = app.post("/upscale").json(&json!({ "accountId": "nope" })).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .post("/upscale")
            .json(&json!({ "accountId": uuid::Uuid::new_v4().to_string() }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_null_enhancements_mean_none() {
        let (app, storage) = create_test_app();
        let account = create_account(storage.as_ref(), 1).await;

        let response = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "twilight",
                "enhancementSelections": null,
                "accountId": account.to_string()
            }))
            .await;

        response.assert_status_ok();
        let body: EnhanceResponse = response.json();
        assert_eq!(body.credits_remaining, 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_wrong_typed_fields_are_validation_errors() {
        let (app, storage) = create_test_app();
        let account = create_account(storage.as_ref(), 1).await;

        let enhance = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "twilight",
                "accountId": 42
            }))
            .await;
        enhance.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = enhance.json();
        assert_eq!(body["code"], "validation_error");

        let enhance = app
            .post("/enhance")
            .json(&json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "twilight",
                "enhancementSelections": "remove-cars",
                "accountId": account.to_string()
            }))
            .await;
        enhance.assert_status(StatusCode::BAD_REQUEST);

        let upscale = app.post("/upscale").json(&json!({ "variationUrl": 7, "accountId": account.to_string() })).await;
        upscale.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = upscale.json();
        assert_eq!(body["code"], "validation_error");

        let upscale = app.post("/upscale").text("not json").await;
        upscale.assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(storage.get_account(account).await.unwrap().unwrap().credits, 1);
        assert_eq!(storage.job_count(), 0);
    }
}
