//! Weak supervision API handlers
//!
//! POST /fit_predict, POST /export_ws_stats

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::db::Session;
use crate::models::PrecisionOverride;
use crate::AppState;

/// POST /fit_predict request
#[derive(Debug, Deserialize)]
pub struct FitPredictRequest {
    pub project_id: String,
    pub labeling_task_id: String,
    pub user_id: String,
    pub weak_supervision_task_id: String,
    /// Scalar or `{source_id: precision}`
    #[serde(default, alias = "overwrite_weak_supervision")]
    pub precision_override: Option<PrecisionOverride>,
}

/// POST /export_ws_stats request
#[derive(Debug, Deserialize)]
pub struct ExportStatsRequest {
    pub project_id: String,
    pub labeling_task_id: String,
    #[serde(default, alias = "overwrite_weak_supervision")]
    pub precision_override: Option<PrecisionOverride>,
}

/// POST /fit_predict
///
/// Runs in the background; the outcome is the persisted task state.
pub async fn fit_predict(
    State(state): State<AppState>,
    Json(request): Json<FitPredictRequest>,
) -> StatusCode {
    info!(
        project_id = %request.project_id,
        labeling_task_id = %request.labeling_task_id,
        weak_supervision_task_id = %request.weak_supervision_task_id,
        "Weak supervision requested"
    );

    let orchestrator = state.orchestrator.clone();
    let mut session = Session::new(state.db.clone());
    tokio::spawn(async move {
        orchestrator
            .fit_predict(
                &mut session,
                &request.project_id,
                &request.labeling_task_id,
                &request.user_id,
                &request.weak_supervision_task_id,
                request.precision_override.as_ref(),
            )
            .await;
    });

    StatusCode::OK
}

/// POST /export_ws_stats
pub async fn export_ws_stats(
    State(state): State<AppState>,
    Json(request): Json<ExportStatsRequest>,
) -> (StatusCode, String) {
    let mut session = Session::new(state.db.clone());
    state
        .orchestrator
        .export_weak_supervision_stats(
            &mut session,
            &request.project_id,
            &request.labeling_task_id,
            request.precision_override.as_ref(),
        )
        .await
}

pub fn weak_supervision_routes() -> Router<AppState> {
    Router::new()
        .route("/fit_predict", post(fit_predict))
        .route("/export_ws_stats", post(export_ws_stats))
}
