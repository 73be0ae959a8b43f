//! OpenAPI documentation configuration.
//!
//! The document is served at `/api-docs/openapi.json` with an interactive viewer at `/docs`.

use utoipa::OpenApi;

use crate::{api, errors, prompt};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "skyctl API",
        description = "Credit-metered sky replacement and photo enhancement for real estate listings"
    ),
    paths(
        api::handlers::enhance::enhance,
        api::handlers::enhance::upscale,
        api::handlers::options::list_options,
        api::handlers::accounts::create_account,
        api::handlers::accounts::get_account,
        api::handlers::accounts::list_transactions,
        api::handlers::jobs::get_job,
        api::handlers::jobs::select_variation,
        api::handlers::jobs::record_download,
        api::handlers::payments::webhook,
        api::handlers::health::healthz,
    ),
    components(
        schemas(
            api::models::enhance::EnhanceRequest,
            api::models::enhance::EnhanceResponse,
            api::models::enhance::UpscaleRequest,
            api::models::enhance::UpscaleResponse,
            api::models::accounts::AccountResponse,
            api::models::accounts::TransactionResponse,
            api::models::accounts::TransactionListResponse,
            api::models::jobs::JobResponse,
            api::models::jobs::VariationResponse,
            api::models::jobs::ArtifactResponse,
            api::models::webhooks::WebhookAck,
            prompt::OptionCatalogue,
            prompt::OptionEntry,
            errors::ErrorBody,
        )
    ),
    tags(
        (name = "enhance", description = "Charge a credit to generate four sky-replaced variations of a listing photo, then upscale the one you pick.

One enhancement costs one credit. If generation fails after the charge, the credit is refunded before the response is sent. Upscaling is free."),
        (name = "accounts", description = "Credit balances and the purchase/refund history behind them."),
        (name = "jobs", description = "Inspect enhancement jobs, choose a variation, and count artifact downloads."),
        (name = "payments", description = "Signed notifications from the payment processor. Each payment credits its account exactly once, however often it is delivered."),
        (name = "operations", description = "Liveness and operational endpoints."),
    )
)]
pub struct ApiDoc;
