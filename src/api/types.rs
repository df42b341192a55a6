//! API request/response types.

use serde::{Deserialize, Serialize};

use crate::pipeline::EventStatus;

/// Response for `POST /webhook`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: EventStatus,
}

/// Response for `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub message: String,
}
