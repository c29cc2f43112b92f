//! API request and response types

use crate::db::SessionRecord;
use serde::{Deserialize, Serialize};

/// One chat turn
#[derive(Debug, Deserialize)]
pub struct ChatQueryRequest {
    /// Omitted on the first turn; the reply carries the minted id
    #[serde(default)]
    pub session_id: Option<String>,
    pub user_query: String,
}

/// Service liveness
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    pub database: bool,
}

/// Stored session with its transcript
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionRecord,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
