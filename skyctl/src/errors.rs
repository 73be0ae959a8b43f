use crate::db::errors::DbError;
use crate::providers::ProviderError;
use crate::types::{AccountId, JobId};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing, blank or malformed request data
    #[error("{message}")]
    Validation { message: String },

    /// A sky or enhancement key outside the closed option sets
    #[error("Unknown {kind} option '{key}'")]
    InvalidOption { kind: &'static str, key: String },

    /// The account's balance doesn't cover the charge. Nothing was changed.
    #[error("Account {account_id} has insufficient credits")]
    InsufficientCredits { account_id: AccountId },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generation or upscale provider failure (timeout, upstream error, malformed output)
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An enhancement job failed after its credit was debited. The job has been marked
    /// failed and the debit compensated.
    #[error("Enhancement job {job_id} failed: {source}")]
    JobFailed {
        job_id: JobId,
        credits_remaining: Option<i64>,
        #[source]
        source: Box<Error>,
    },

    /// Payment webhook signature could not be verified
    #[error("Invalid webhook signature: {reason}")]
    Signature { reason: String },

    /// A payment webhook arrived but no payment processor is configured
    #[error("No payment processor configured")]
    PaymentNotConfigured,

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body of every error response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// User-safe description
    pub error: String,
    /// Stable machine-readable code, e.g. `insufficient_credits`
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<i64>,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } | Error::InvalidOption { .. } | Error::Signature { .. } => StatusCode::BAD_REQUEST,
            Error::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Provider(_) | Error::JobFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PaymentNotConfigured => StatusCode::NOT_IMPLEMENTED,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } | DbError::Conflict { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation_error",
            Error::InvalidOption { .. } => "invalid_option",
            Error::InsufficientCredits { .. } => "insufficient_credits",
            Error::NotFound { .. } => "not_found",
            Error::Provider(ProviderError::Timeout { .. }) => "provider_timeout",
            Error::Provider(_) => "provider_error",
            Error::JobFailed { source, .. } => match source.code() {
                code @ ("provider_timeout" | "provider_error") => code,
                _ => "internal_error",
            },
            Error::Signature { .. } => "signature_error",
            Error::PaymentNotConfigured => "not_implemented",
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "not_found",
                DbError::UniqueViolation { .. } | DbError::Conflict { .. } => "conflict",
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => "validation_error",
                DbError::Other(_) => "internal_error",
            },
            Error::Other(_) => "internal_error",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    /// or upstream provider payloads
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message } => message.clone(),
            Error::InvalidOption { .. } | Error::InsufficientCredits { .. } | Error::NotFound { .. } => self.to_string(),
            Error::Provider(ProviderError::Timeout { .. }) => "The image provider did not respond in time".to_string(),
            Error::Provider(_) => "The image provider failed to process the request".to_string(),
            Error::JobFailed { source, .. } => format!("Enhancement failed and your credit was refunded. {}", source.user_message()),
            Error::Signature { .. } => "Invalid webhook signature".to_string(),
            Error::PaymentNotConfigured => self.to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::Conflict { reason, .. } => reason.clone(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (job_id, credits_remaining) = match self {
            Error::JobFailed {
                job_id, credits_remaining, ..
            } => (Some(*job_id), *credits_remaining),
            _ => (None, None),
        };
        ErrorBody {
            error: self.user_message(),
            code: self.code().to_string(),
            job_id,
            credits_remaining,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Database(DbError::Other(_)) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Provider(_) | Error::JobFailed { .. } => {
                tracing::error!("Provider failure: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Signature { .. } | Error::PaymentNotConfigured => {
                tracing::warn!("Rejected webhook: {}", self);
            }
            Error::Validation { .. } | Error::InvalidOption { .. } | Error::InsufficientCredits { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Request bodies that are not valid JSON for the endpoint are validation errors
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation {
            message: rejection.body_text(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
