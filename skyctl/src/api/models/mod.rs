//! API request and response data models.
//!
//! API models are distinct from database models, so storage columns can change without
//! changing the public contract. All models are annotated with `utoipa` for the API docs.
//!
//! - [`accounts`]: Balances and transaction history
//! - [`enhance`]: Enhancement and upscale requests and results
//! - [`jobs`]: Jobs, variations and final artifacts
//! - [`pagination`]: Offset pagination query parameters
//! - [`webhooks`]: Webhook acknowledgement

pub mod accounts;
pub mod enhance;
pub mod jobs;
pub mod pagination;
pub mod webhooks;
