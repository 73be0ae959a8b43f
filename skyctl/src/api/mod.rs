//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Enhancement** (`/enhance`, `/upscale`): The charged generation and free upscale steps
//! - **Options** (`/options`): Sky presets and enhancements a client can offer
//! - **Accounts** (`/accounts/*`): Balances and ledger history
//! - **Jobs** (`/jobs/*`, `/variations/*`, `/artifacts/*`): Inspection, selection, downloads
//! - **Webhooks** (`/webhooks/payment`): Signed payment processor notifications
//!
//! All bodies are JSON with camelCase fields. Errors use the body described by
//! [`crate::errors::ErrorBody`].
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/docs` when the server is running.

pub mod handlers;
pub mod models;
