//! Weak supervision statistics export
//!
//! Writes `{inference_dir}/{project_id}/weak-supervision-{labeling_task_id}.msgpack`,
//! a MessagePack map `(source, label) -> {stat: value}`, replacing any
//! earlier export of the task.

use axum::http::StatusCode;
use std::path::PathBuf;
use tracing::{error, info};

use super::Orchestrator;
use crate::db::{associations, labeling_tasks, Session};
use crate::engine::build_vectors;
use crate::error::{WsError, WsResult};
use crate::models::{PrecisionOverride, StatsLookup};
use crate::services::statistics_translator::export_lookup;
use crate::services::{collect_for_task, resolve_stats_source, StatsSource};

pub const CANNOT_COMPUTE_MESSAGE: &str = "Can't compute weak supervision";

impl Orchestrator {
    /// Artifact location of a labeling task's export
    pub fn export_path(&self, project_id: &str, labeling_task_id: &str) -> PathBuf {
        self.inference_dir()
            .join(project_id)
            .join(format!("weak-supervision-{}.msgpack", labeling_task_id))
    }

    pub async fn export_weak_supervision_stats(
        &self,
        session: &mut Session,
        project_id: &str,
        labeling_task_id: &str,
        requested: Option<&PrecisionOverride>,
    ) -> (StatusCode, String) {
        match self
            .run_export(session, project_id, labeling_task_id, requested)
            .await
        {
            Ok(path) => {
                info!(
                    project_id = %project_id,
                    labeling_task_id = %labeling_task_id,
                    path = %path.display(),
                    "Weak supervision statistics exported"
                );
                (StatusCode::OK, "OK".to_string())
            }
            Err(WsError::MissingReferenceData) => (StatusCode::NOT_FOUND, CANNOT_COMPUTE_MESSAGE.to_string()),
            Err(e @ (WsError::UnsupportedTaskType(_) | WsError::NotFound(_))) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            Err(e) => {
                error!(
                    project_id = %project_id,
                    labeling_task_id = %labeling_task_id,
                    error = %e,
                    "Weak supervision export failed"
                );
                if let Err(e) = session.rollback().await {
                    error!(error = %e, "Rollback failed");
                }
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        }
    }

    async fn run_export(
        &self,
        session: &mut Session,
        project_id: &str,
        labeling_task_id: &str,
        requested: Option<&PrecisionOverride>,
    ) -> WsResult<PathBuf> {
        let task = labeling_tasks::get(session.conn().await?, project_id, labeling_task_id)
            .await?
            .ok_or_else(|| WsError::NotFound(format!("labeling task {}", labeling_task_id)))?;
        task.task_type()?;

        let manual_records =
            associations::count_manual_records(session.conn().await?, project_id, labeling_task_id).await?;

        let lookup: StatsLookup = match resolve_stats_source(&task, requested, manual_records) {
            StatsSource::Explicit(o) | StatsSource::NoGroundTruth(o) => o.to_lookup(),
            StatsSource::Computed => {
                let (_, table) = collect_for_task(session.conn().await?, &task, false).await?;
                let rows = self.engine().quality_metrics(&build_vectors(&table)).await?;
                if rows.is_empty() {
                    return Err(WsError::MissingReferenceData);
                }
                export_lookup(&rows)
            }
        };
        session.commit().await?;

        let path = self.export_path(project_id, labeling_task_id);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let bytes = rmp_serde::to_vec(&lookup)?;
        tokio::fs::write(&path, bytes).await?;

        Ok(path)
    }
}
