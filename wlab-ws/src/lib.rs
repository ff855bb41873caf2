//! wlab-ws library interface
//!
//! Weak supervision microservice: combines weak labels of information
//! sources into consolidated predictions and maintains per-source quality
//! and quantity statistics.

pub mod api;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult, WsError, WsResult};

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::workflow::Orchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(db: SqlitePool, orchestrator: Orchestrator) -> Self {
        Self {
            db,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::weak_supervision_routes())
        .merge(api::statistics_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
