//! Error-to-response mapping for the HTTP surface.
//!
//! Callers always receive `{status: "failure", message}`. Classified
//! failures echo their message; everything else gets a generic body and
//! the detail goes to the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::SyncError;

/// Generic body for failures whose detail must stay in the logs.
const INTERNAL_MESSAGE: &str =
    "We're unable to process your request. Kindly check logs to know more details.";

/// Body for secret-key mismatches.
const UNAUTHORIZED_MESSAGE: &str = "You don't have permission to perform this operation. \
     Kindly contact your administrator for more details.";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        SyncError::Auth(UNAUTHORIZED_MESSAGE.to_string()).into()
    }

    pub fn not_found_route() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "We couldn't find the requested url.".to_string(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let status = StatusCode::from_u16(err.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = if err.is_caller_visible() {
            err.to_string()
        } else {
            error!(error = %err, "request failed");
            INTERNAL_MESSAGE.to_string()
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "failure",
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Standard success body.
pub fn success(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "message": message.into(),
    }))
}
