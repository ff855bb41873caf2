//! Quality and quantity statistics flows
//!
//! Quality statistics are updated in place; entries of sources missing from
//! the result stay untouched. Quantity statistics of the requesting source
//! are deleted before the fresh result of every source is written.

use std::collections::HashSet;
use tracing::{debug, info};

use super::Orchestrator;
use crate::db::{information_sources, labeling_tasks, Session};
use crate::engine::{build_vectors, EngineError};
use crate::error::{WsError, WsResult};
use crate::models::{LabelingTask, NestedStats, QualityStats};
use crate::services::collect_for_task;
use crate::services::statistics_translator::{quality_stats, quantity_stats};

impl Orchestrator {
    /// Quality statistics of every source in a labeling task
    pub async fn calculate_quality_statistics_for_labeling_task(
        &self,
        session: &mut Session,
        project_id: &str,
        labeling_task_id: &str,
        user_id: &str,
    ) -> WsResult<()> {
        let task = labeling_tasks::get(session.conn().await?, project_id, labeling_task_id)
            .await?
            .ok_or_else(|| WsError::NotFound(format!("labeling task {}", labeling_task_id)))?;
        let excluded =
            information_sources::exclusion_record_ids_for_task(session.conn().await?, &task.id).await?;

        let Some(stats) = self
            .quality_or_notify(session, &task, &excluded, user_id)
            .await?
        else {
            return Ok(());
        };

        for (source_id, by_label) in &stats {
            for (label_id, quality) in by_label {
                information_sources::update_quality_stats(
                    session.conn().await?,
                    &task.project_id,
                    source_id,
                    label_id,
                    quality,
                )
                .await?;
            }
            session.commit().await?;
        }

        info!(
            labeling_task_id = %labeling_task_id,
            sources = stats.len(),
            "Quality statistics updated"
        );
        Ok(())
    }

    /// Quality statistics of one source, ignoring that source's excluded records
    pub async fn calculate_quality_statistics_for_source(
        &self,
        session: &mut Session,
        project_id: &str,
        source_id: &str,
        user_id: &str,
    ) -> WsResult<()> {
        let task = self.task_of_source(session, project_id, source_id).await?;
        let excluded = information_sources::exclusion_record_ids(session.conn().await?, source_id).await?;

        let Some(stats) = self
            .quality_or_notify(session, &task, &excluded, user_id)
            .await?
        else {
            return Ok(());
        };

        if let Some(by_label) = stats.get(source_id) {
            for (label_id, quality) in by_label {
                information_sources::update_quality_stats(
                    session.conn().await?,
                    &task.project_id,
                    source_id,
                    label_id,
                    quality,
                )
                .await?;
            }
            session.commit().await?;
            debug!(source_id = %source_id, labels = by_label.len(), "Source quality statistics updated");
        }
        Ok(())
    }

    /// Quantity statistics of every source in the source's labeling task
    ///
    /// Returns false when the source hits no record at all; the user then
    /// gets a no-coverage notification.
    pub async fn calculate_quantity_statistics_for_labeling_task_from_source(
        &self,
        session: &mut Session,
        project_id: &str,
        source_id: &str,
        user_id: &str,
    ) -> WsResult<bool> {
        match self.rewrite_quantity_statistics(session, project_id, source_id).await {
            Ok(()) => Ok(true),
            Err(WsError::NoCoverageData(_)) => {
                information_sources::delete_stats(session.conn().await?, project_id, source_id).await?;
                session.commit().await?;
                info!(source_id = %source_id, "Information source hits no records");
                self.notifier()
                    .send_warning_no_coverage_data(session, project_id, user_id)
                    .await?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn rewrite_quantity_statistics(
        &self,
        session: &mut Session,
        project_id: &str,
        source_id: &str,
    ) -> WsResult<()> {
        let task = self.task_of_source(session, project_id, source_id).await?;
        let (task_type, table) = collect_for_task(session.conn().await?, &task, false).await?;
        let rows = self.engine().quantity_metrics(&build_vectors(&table)).await?;
        let stats = quantity_stats(task_type, &rows);

        if !stats.contains_key(source_id) {
            return Err(WsError::NoCoverageData(source_id.to_string()));
        }

        information_sources::delete_stats(session.conn().await?, &task.project_id, source_id).await?;
        session.commit().await?;

        for (stats_source_id, by_label) in &stats {
            for (label_id, quantity) in by_label {
                information_sources::update_quantity_stats(
                    session.conn().await?,
                    &task.project_id,
                    stats_source_id,
                    label_id,
                    quantity,
                )
                .await?;
                session.commit().await?;
            }
        }

        info!(
            source_id = %source_id,
            labeling_task_id = %task.id,
            sources = stats.len(),
            "Quantity statistics rewritten"
        );
        Ok(())
    }

    async fn task_of_source(
        &self,
        session: &mut Session,
        project_id: &str,
        source_id: &str,
    ) -> WsResult<LabelingTask> {
        labeling_tasks::get_by_source_id(session.conn().await?, project_id, source_id)
            .await?
            .ok_or_else(|| WsError::NotFound(format!("information source {}", source_id)))
    }

    /// Quality statistics without the excluded records; `None` after a
    /// no-reference-data notification
    async fn quality_or_notify(
        &self,
        session: &mut Session,
        task: &LabelingTask,
        excluded: &HashSet<String>,
        user_id: &str,
    ) -> WsResult<Option<NestedStats<QualityStats>>> {
        let (task_type, mut table) = collect_for_task(session.conn().await?, task, false).await?;
        table.exclude_records(excluded);

        match self.engine().quality_metrics(&build_vectors(&table)).await {
            Ok(rows) => Ok(Some(quality_stats(task_type, &rows))),
            Err(EngineError::MissingReferenceData) => {
                info!(labeling_task_id = %task.id, "No manual reference data for quality statistics");
                self.notifier()
                    .send_warning_no_reference_data(session, &task.project_id, user_id)
                    .await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
