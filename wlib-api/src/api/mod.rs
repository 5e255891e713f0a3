//! HTTP API handlers for wlib-api

pub mod admin;
pub mod health;
pub mod reviews;
pub mod submit;

pub use admin::{deactivate, reconcile};
pub use health::health_routes;
pub use reviews::get_reviews;
pub use submit::submit;
