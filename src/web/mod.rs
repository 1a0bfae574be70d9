//! # HTTP Surface
//!
//! Axum routes, handlers, middleware, and shared state for the sync
//! service. All request/response bodies are `{status, message}` JSON;
//! errors are mapped centrally in [`errors`].

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use errors::ApiError;
pub use routes::build_router;
pub use state::AppState;
