//! wlib-api library - HTTP surface of the wheel library backend
//!
//! Exposes the application state and router so integration tests can
//! drive the service in-process.

pub mod api;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use wlib_common::config::Config;
use wlib_common::store::TabularStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Tabular store holding the canonical tables
    pub store: Arc<dyn TabularStore>,
    /// Resolved runtime configuration (allow-list, verify policy)
    pub config: Arc<Config>,
    /// Serializes every read-max/assign-id/append sequence. The store
    /// has no transaction isolation, so without this gate two
    /// submissions could mint the same wheel or member id.
    pub write_gate: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn TabularStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
            write_gate: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/submit", post(api::submit))
        .route("/api/reviews", get(api::get_reviews))
        .route("/api/admin/reconcile", post(api::reconcile))
        .route("/api/admin/deactivate", post(api::deactivate))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
