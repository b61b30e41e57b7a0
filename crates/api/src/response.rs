//! API response helpers.

use axum::Json;
use serde::Serialize;

/// Plain message response body.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    /// Human-readable outcome description.
    pub message: String,
}

/// Build a `{"message": ...}` JSON body.
pub fn message(text: impl Into<String>) -> Json<ApiMessage> {
    Json(ApiMessage {
        message: text.into(),
    })
}
