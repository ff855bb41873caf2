//! Fit/predict flow
//!
//! Never returns an error: a failed run rolls back its partial writes and
//! leaves the weak supervision task `FAILED`.

use std::collections::HashSet;
use tracing::{error, info};

use super::Orchestrator;
use crate::db::weak_supervision::{self, RunSummary};
use crate::db::{associations, labeling_tasks, Session};
use crate::engine::build_vectors;
use crate::error::{WsError, WsResult};
use crate::models::{PayloadState, PrecisionOverride};
use crate::services::{collect_for_task, resolve_stats_source};

impl Orchestrator {
    pub async fn fit_predict(
        &self,
        session: &mut Session,
        project_id: &str,
        labeling_task_id: &str,
        user_id: &str,
        weak_supervision_task_id: &str,
        requested: Option<&PrecisionOverride>,
    ) {
        let result = self
            .run_fit_predict(
                session,
                project_id,
                labeling_task_id,
                user_id,
                weak_supervision_task_id,
                requested,
            )
            .await;

        match result {
            Ok(result_count) => {
                info!(
                    project_id = %project_id,
                    labeling_task_id = %labeling_task_id,
                    weak_supervision_task_id = %weak_supervision_task_id,
                    result_count,
                    "Weak supervision finished"
                );
            }
            Err(e) => {
                error!(
                    project_id = %project_id,
                    labeling_task_id = %labeling_task_id,
                    weak_supervision_task_id = %weak_supervision_task_id,
                    error = %e,
                    "Weak supervision failed"
                );
                if let Err(e) = self.mark_failed(session, project_id, weak_supervision_task_id).await {
                    error!(
                        weak_supervision_task_id = %weak_supervision_task_id,
                        error = %e,
                        "Could not mark weak supervision task as failed"
                    );
                }
            }
        }
    }

    async fn run_fit_predict(
        &self,
        session: &mut Session,
        project_id: &str,
        labeling_task_id: &str,
        user_id: &str,
        weak_supervision_task_id: &str,
        requested: Option<&PrecisionOverride>,
    ) -> WsResult<usize> {
        let task = labeling_tasks::get(session.conn().await?, project_id, labeling_task_id)
            .await?
            .ok_or_else(|| WsError::NotFound(format!("labeling task {}", labeling_task_id)))?;

        let manual_records =
            associations::count_manual_records(session.conn().await?, project_id, labeling_task_id).await?;
        let stats_source = resolve_stats_source(&task, requested, manual_records);

        let (_, table) = collect_for_task(session.conn().await?, &task, true).await?;
        let vectors = build_vectors(&table);

        info!(
            labeling_task_id = %labeling_task_id,
            engine = self.engine().name(),
            stats = stats_source.kind(),
            sources = vectors.source_ids().len(),
            "Combining weak labels"
        );

        let predictions = self
            .engine()
            .combine(&vectors, stats_source.stats_override())
            .await?;

        let used: HashSet<&str> = vectors.source_ids().into_iter().collect();
        let selected_information_sources = task
            .information_sources
            .iter()
            .filter(|s| used.contains(s.id.as_str()))
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let summary = RunSummary {
            selected_information_sources,
            distinct_records: vectors.distinct_records() as i64,
        };

        weak_supervision::store_predictions(
            session.conn().await?,
            project_id,
            labeling_task_id,
            user_id,
            weak_supervision_task_id,
            &predictions,
            &summary,
        )
        .await?;
        session.commit().await?;

        Ok(predictions.result_count())
    }

    async fn mark_failed(
        &self,
        session: &mut Session,
        project_id: &str,
        weak_supervision_task_id: &str,
    ) -> WsResult<()> {
        session.rollback().await?;
        weak_supervision::update_state(
            session.conn().await?,
            project_id,
            weak_supervision_task_id,
            PayloadState::Failed,
        )
        .await?;
        session.commit().await?;
        Ok(())
    }
}
