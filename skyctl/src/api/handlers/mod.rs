//! HTTP request handlers for all API endpoints.
//!
//! Handlers only translate between HTTP and the services on [`crate::AppState`]: request
//! validation beyond deserialization, charging and provider calls live in the services.
//!
//! # Handler Modules
//!
//! - [`accounts`]: Account creation, balance and transaction history
//! - [`enhance`]: Charged enhancement and upscaling of a selected variation
//! - [`health`]: Liveness probe
//! - [`jobs`]: Job inspection, variation selection and artifact downloads
//! - [`options`]: Sky preset and enhancement catalogue
//! - [`payments`]: Payment processor webhooks
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to the matching HTTP status and a
//! JSON error body.

use uuid::Uuid;

use crate::errors::{Error, Result};

pub mod accounts;
pub mod enhance;
pub mod health;
pub mod jobs;
pub mod options;
pub mod payments;

/// Parse an id that arrived inside a JSON body
fn parse_uuid(value: Option<&str>, field: &str) -> Result<Uuid> {
    let value = value.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| Error::Validation {
        message: format!("{field} is required"),
    })?;
    Uuid::parse_str(value).map_err(|_| Error::Validation {
        message: format!("{field} '{value}' is not a valid UUID"),
    })
}
