//! Route table for the sync service.

use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::web::errors::ApiError;
use crate::web::state::AppState;
use crate::web::{handlers, middleware};

/// Per-request budget. Page transfers download and re-upload an archive,
/// so this is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Build the complete router. Everything except `/health` requires the
/// shared secret.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/import", post(handlers::sync::start_import))
        .route("/export-datastore", post(handlers::callbacks::export_datastore))
        .route("/import-analytics", post(handlers::callbacks::import_analytics))
        .route("/row", post(handlers::rows::mirror_row))
        .route("/event", post(handlers::rows::change_event))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::require_secret,
        ));

    Router::new()
        .merge(protected)
        .route("/health", get(handlers::health::health_check))
        .fallback(unknown_route)
        .layer(axum::middleware::from_fn(middleware::add_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

async fn unknown_route() -> ApiError {
    ApiError::not_found_route()
}
