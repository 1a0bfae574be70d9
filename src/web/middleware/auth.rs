//! Shared-secret authentication middleware.
//!
//! Every protected route requires the deployment's secret key. It
//! normally arrives in the `x-sync-secret-key` header; the bulk-import
//! completion callback is the exception, because the analytics platform
//! cannot attach custom headers to its webhook, so that route reads the
//! `secret-key` query parameter instead.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::constants::{headers, query_params};
use crate::web::errors::ApiError;
use crate::web::state::AppState;

pub async fn require_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = if request.uri().path().starts_with("/import-analytics") {
        query_secret(request.uri().query().unwrap_or(""))
    } else {
        request
            .headers()
            .get(headers::SECRET_KEY)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    match presented {
        Some(secret) if secret == state.config.secret_key => Ok(next.run(request).await),
        _ => {
            warn!(path = %request.uri().path(), "request rejected: missing or invalid secret key");
            Err(ApiError::unauthorized())
        }
    }
}

fn query_secret(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == query_params::SECRET_KEY)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_secret_extraction() {
        assert_eq!(
            query_secret("tableName=Orders&secret-key=s3cret&page=2"),
            Some("s3cret".to_string())
        );
        assert_eq!(query_secret("tableName=Orders"), None);
        assert_eq!(
            query_secret("secret-key=with%20space"),
            Some("with space".to_string())
        );
    }
}
