pub mod auth;
pub mod request_id;

pub use auth::require_secret;
pub use request_id::add_request_id;
