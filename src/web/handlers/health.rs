//! Liveness probe.

use axum::Json;
use serde_json::{json, Value};

/// `GET /health` - unauthenticated liveness check.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
