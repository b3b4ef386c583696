//! forma-server library - form responses and live analytics
//!
//! Stores forms and their append-only response logs, validates submissions,
//! and serves per-field analytics either immediately or through a long-poll
//! that parks until new responses arrive.

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod analytics;
pub mod api;
pub mod client;
pub mod db;
pub mod error;
pub mod longpoll;
pub mod realtime;
pub mod validation;

pub use error::{ApiError, ApiResult};

use analytics::SnapshotCache;
use realtime::Hub;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Wake channels for parked long-polls
    pub hub: Arc<Hub>,
    /// Incremental analytics per form
    pub cache: Arc<SnapshotCache>,
    /// How long a long-poll is held before the timeout sentinel
    pub longpoll_timeout: Duration,
    /// Service start time (for uptime in /health)
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, longpoll_timeout: Duration) -> Self {
        Self {
            db,
            hub: Arc::new(Hub::new()),
            cache: Arc::new(SnapshotCache::new()),
            longpoll_timeout,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::form_routes())
        .merge(api::response_routes())
        .merge(api::analytics_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
