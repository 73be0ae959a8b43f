use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Returned for every verified delivery, whether or not it changed anything
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}
