use axum::http::StatusCode;

/// Liveness probe
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "operations",
    summary = "Liveness probe",
    responses((status = 200, description = "The server is up")),
)]
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
