//! Data Collector
//!
//! Builds the normalized label table of a labeling task: information source
//! rows (all sources, or selected ones only) followed by every manual row,
//! with exact duplicates collapsed.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::db::associations::{self, AssociationScope};
use crate::db::labeling_tasks;
use crate::error::{WsError, WsResult};
use crate::models::{LabelTable, LabelingTask, TaskType};

/// Load the labeling task and collect its table
pub async fn collect_data(
    conn: &mut SqliteConnection,
    project_id: &str,
    labeling_task_id: &str,
    only_selected: bool,
) -> WsResult<(TaskType, LabelTable)> {
    let task = labeling_tasks::get(&mut *conn, project_id, labeling_task_id)
        .await?
        .ok_or_else(|| WsError::NotFound(format!("labeling task {}", labeling_task_id)))?;

    collect_for_task(conn, &task, only_selected).await
}

/// Collect the table of an already loaded labeling task
pub async fn collect_for_task(
    conn: &mut SqliteConnection,
    task: &LabelingTask,
    only_selected: bool,
) -> WsResult<(TaskType, LabelTable)> {
    let task_type = task.task_type()?;
    let scope = if only_selected {
        AssociationScope::SelectedSources
    } else {
        AssociationScope::AllSources
    };

    let mut table = match task_type {
        TaskType::Classification => {
            let mut rows =
                associations::classification_rows(&mut *conn, &task.project_id, &task.id, scope).await?;
            rows.extend(
                associations::classification_rows(conn, &task.project_id, &task.id, AssociationScope::Manual)
                    .await?,
            );
            LabelTable::Classification(rows)
        }
        TaskType::Extraction => {
            let mut rows = associations::token_rows(&mut *conn, &task.project_id, &task.id, scope).await?;
            rows.extend(
                associations::token_rows(conn, &task.project_id, &task.id, AssociationScope::Manual).await?,
            );
            LabelTable::Extraction(rows)
        }
    };

    let collected = table.len();
    table.dedup();

    debug!(
        project_id = %task.project_id,
        labeling_task_id = %task.id,
        task_type = %task_type,
        only_selected,
        rows = table.len(),
        duplicates = collected - table.len(),
        "Collected label table"
    );

    Ok((task_type, table))
}
