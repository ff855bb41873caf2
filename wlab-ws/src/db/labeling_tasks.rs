//! Labeling task lookups
//!
//! A task is loaded together with its labels (ordered by name) and its
//! information sources (ordered by creation time).

use sqlx::{Row, SqliteConnection};

use crate::error::WsResult;
use crate::models::{InformationSource, Label, LabelingTask};

/// Labeling task scoped to a project
pub async fn get(
    conn: &mut SqliteConnection,
    project_id: &str,
    labeling_task_id: &str,
) -> WsResult<Option<LabelingTask>> {
    let row = sqlx::query(
        "SELECT id, project_id, name, task_type FROM labeling_task WHERE id = ? AND project_id = ?",
    )
    .bind(labeling_task_id)
    .bind(project_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(load(conn, row).await?)),
        None => Ok(None),
    }
}

/// Labeling task that owns the given information source
pub async fn get_by_source_id(
    conn: &mut SqliteConnection,
    project_id: &str,
    source_id: &str,
) -> WsResult<Option<LabelingTask>> {
    let row = sqlx::query(
        r#"
        SELECT t.id, t.project_id, t.name, t.task_type
        FROM labeling_task t
        JOIN information_source s ON s.labeling_task_id = t.id
        WHERE s.id = ? AND s.project_id = ?
        "#,
    )
    .bind(source_id)
    .bind(project_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(load(conn, row).await?)),
        None => Ok(None),
    }
}

async fn load(conn: &mut SqliteConnection, row: sqlx::sqlite::SqliteRow) -> WsResult<LabelingTask> {
    let id: String = row.get("id");
    let project_id: String = row.get("project_id");

    let labels = sqlx::query(
        "SELECT id, name FROM labeling_task_label WHERE labeling_task_id = ? ORDER BY name, id",
    )
    .bind(&id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| Label {
        id: r.get("id"),
        name: r.get("name"),
    })
    .collect();

    let information_sources = sqlx::query(
        r#"
        SELECT id, project_id, labeling_task_id, name, is_selected
        FROM information_source
        WHERE labeling_task_id = ?
        ORDER BY created_at, name
        "#,
    )
    .bind(&id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| InformationSource {
        id: r.get("id"),
        project_id: r.get("project_id"),
        labeling_task_id: r.get("labeling_task_id"),
        name: r.get("name"),
        is_selected: r.get("is_selected"),
    })
    .collect();

    Ok(LabelingTask {
        id,
        project_id,
        name: row.get("name"),
        task_type: row.get("task_type"),
        labels,
        information_sources,
    })
}
