//! HTTP handlers for accounts and their ledger history.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        accounts::{AccountResponse, TransactionListResponse, TransactionResponse},
        pagination::Pagination,
    },
    db::models::accounts::AccountCreateDBRequest,
    errors::{ErrorBody, Result},
    types::AccountId,
};

/// Create an account
#[utoipa::path(
    post,
    path = "/accounts",
    tag = "accounts",
    summary = "Create an account",
    description = "Creates an account holding the configured number of initial credits",
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 500, description = "Internal server error", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn create_account(State(state): State<AppState>) -> Result<(StatusCode, Json<AccountResponse>)> {
    let request = AccountCreateDBRequest::new(state.config.credits.initial_credits);
    let account = state.storage.create_account(&request).await?;
    tracing::info!(account = %account.id, credits = account.credits, "Created account");
    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Get an account and its balance
#[utoipa::path(
    get,
    path = "/accounts/{account_id}",
    tag = "accounts",
    summary = "Get an account",
    params(
        ("account_id" = String, Path, description = "Account ID", format = "uuid"),
    ),
    responses(
        (status = 200, description = "Account details", body = AccountResponse),
        (status = 404, description = "Account not found", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn get_account(State(state): State<AppState>, Path(account_id): Path<AccountId>) -> Result<Json<AccountResponse>> {
    Ok(Json(state.ledger.account(account_id).await?.into()))
}

/// List an account's transactions
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/transactions",
    tag = "accounts",
    summary = "List transactions",
    description = "Purchases and refunds for the account, newest first",
    params(
        ("account_id" = String, Path, description = "Account ID", format = "uuid"),
        Pagination,
    ),
    responses(
        (status = 200, description = "Transactions", body = TransactionListResponse),
        (status = 404, description = "Account not found", body = ErrorBody),
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<TransactionListResponse>> {
    let (skip, limit) = pagination.params();
    let transactions = state.ledger.transactions(account_id, skip, limit).await?;
    let credits = state.ledger.balance(account_id).await?;

    Ok(Json(TransactionListResponse {
        data: transactions.into_iter().map(TransactionResponse::from).collect(),
        skip,
        limit,
        credits,
    }))
}
