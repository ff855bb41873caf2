//! Statistics API handlers
//!
//! POST /labeling_task_statistics, POST /source_statistics

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use crate::db::Session;
use crate::error::ApiResult;
use crate::AppState;

/// POST /labeling_task_statistics request
#[derive(Debug, Deserialize)]
pub struct TaskStatsRequest {
    pub project_id: String,
    pub labeling_task_id: String,
    pub user_id: String,
}

/// POST /source_statistics request
#[derive(Debug, Deserialize)]
pub struct SourceStatsRequest {
    pub project_id: String,
    pub source_id: String,
    pub user_id: String,
}

/// POST /labeling_task_statistics
pub async fn labeling_task_statistics(
    State(state): State<AppState>,
    Json(request): Json<TaskStatsRequest>,
) -> ApiResult<StatusCode> {
    let mut session = Session::new(state.db.clone());
    state
        .orchestrator
        .calculate_quality_statistics_for_labeling_task(
            &mut session,
            &request.project_id,
            &request.labeling_task_id,
            &request.user_id,
        )
        .await?;

    Ok(StatusCode::OK)
}

/// POST /source_statistics
///
/// Quantity first; quality only when the source hits any record.
pub async fn source_statistics(
    State(state): State<AppState>,
    Json(request): Json<SourceStatsRequest>,
) -> ApiResult<StatusCode> {
    let mut session = Session::new(state.db.clone());
    let has_coverage = state
        .orchestrator
        .calculate_quantity_statistics_for_labeling_task_from_source(
            &mut session,
            &request.project_id,
            &request.source_id,
            &request.user_id,
        )
        .await?;

    if has_coverage {
        state
            .orchestrator
            .calculate_quality_statistics_for_source(
                &mut session,
                &request.project_id,
                &request.source_id,
                &request.user_id,
            )
            .await?;
    }

    Ok(StatusCode::OK)
}

pub fn statistics_routes() -> Router<AppState> {
    Router::new()
        .route("/labeling_task_statistics", post(labeling_task_statistics))
        .route("/source_statistics", post(source_statistics))
}
