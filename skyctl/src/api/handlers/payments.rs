//! HTTP handler for payment processor webhooks.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};

use crate::{
    AppState,
    api::models::webhooks::WebhookAck,
    errors::{Error, ErrorBody, Result},
};

/// Payment webhook handler
///
/// Receives signed events from the payment processor. Every verified delivery is acknowledged
/// with 200, including duplicates and events that need no action, so the processor only
/// retries when the ledger could not be written.
#[utoipa::path(
    post,
    path = "/webhooks/payment",
    tag = "payments",
    summary = "Payment webhook",
    description = "Receives signed checkout events; credits the purchasing account once per payment",
    request_body(content = String, description = "Raw event body as signed by the processor", content_type = "application/json"),
    responses(
        (status = 200, description = "Event received", body = WebhookAck),
        (status = 400, description = "Invalid signature", body = ErrorBody),
        (status = 500, description = "Ledger unavailable; the processor should retry", body = ErrorBody),
        (status = 501, description = "No payment processor configured", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<Json<WebhookAck>> {
    let Some(reconciler) = state.reconciler.as_ref() else {
        return Err(Error::PaymentNotConfigured);
    };

    let outcome = reconciler.reconcile(&headers, &body).await?;
    tracing::debug!(?outcome, "Processed payment webhook");

    Ok(Json(WebhookAck { received: true }))
}
