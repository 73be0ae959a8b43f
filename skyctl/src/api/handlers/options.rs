//! HTTP handler for the option catalogue.

use axum::Json;

use crate::prompt::{self, OptionCatalogue};

/// List sky presets and enhancements
#[utoipa::path(
    get,
    path = "/options",
    tag = "enhance",
    summary = "List enhancement options",
    description = "Every sky preset and enhancement a request may name, with display names and the prompt text each contributes",
    responses(
        (status = 200, description = "Option catalogue", body = OptionCatalogue),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn list_options() -> Json<OptionCatalogue> {
    Json(prompt::catalogue())
}
