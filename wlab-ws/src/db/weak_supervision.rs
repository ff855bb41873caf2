//! Weak supervision task persistence
//!
//! Tasks are created `PENDING` by the caller of fit/predict and moved to a
//! terminal state by the workflow. Storing predictions replaces every
//! earlier weak supervision association of the labeling task.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::engine::Predictions;
use crate::error::{WsError, WsResult};
use crate::models::{PayloadState, WeakSupervisionTask, SOURCE_TYPE_WEAK_SUPERVISION};

/// Run summary written together with the predictions
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Comma-joined names of the sources that took part
    pub selected_information_sources: String,
    pub distinct_records: i64,
}

/// Create a pending weak supervision task
pub async fn create_task(
    conn: &mut SqliteConnection,
    project_id: &str,
    labeling_task_id: &str,
    created_by: Option<&str>,
) -> WsResult<WeakSupervisionTask> {
    let task = WeakSupervisionTask {
        id: Uuid::new_v4().to_string(),
        project_id: project_id.to_string(),
        labeling_task_id: labeling_task_id.to_string(),
        state: PayloadState::Pending,
        created_by: created_by.map(str::to_string),
        created_at: Utc::now(),
        finished_at: None,
        selected_information_sources: None,
        distinct_records: None,
        result_count: None,
    };

    sqlx::query(
        r#"
        INSERT INTO weak_supervision_task (
            id, project_id, labeling_task_id, state, created_by, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&task.id)
    .bind(&task.project_id)
    .bind(&task.labeling_task_id)
    .bind(task.state.as_str())
    .bind(&task.created_by)
    .bind(task.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(task)
}

pub async fn get_task(
    conn: &mut SqliteConnection,
    project_id: &str,
    task_id: &str,
) -> WsResult<Option<WeakSupervisionTask>> {
    let row = sqlx::query(
        r#"
        SELECT id, project_id, labeling_task_id, state, created_by, created_at,
               finished_at, selected_information_sources, distinct_records, result_count
        FROM weak_supervision_task
        WHERE id = ? AND project_id = ?
        "#,
    )
    .bind(task_id)
    .bind(project_id)
    .fetch_optional(conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let state: String = row.get("state");
    let created_at: String = row.get("created_at");
    let finished_at: Option<String> = row.get("finished_at");

    Ok(Some(WeakSupervisionTask {
        id: row.get("id"),
        project_id: row.get("project_id"),
        labeling_task_id: row.get("labeling_task_id"),
        state: state.parse()?,
        created_by: row.get("created_by"),
        created_at: parse_timestamp(&created_at)?,
        finished_at: finished_at.as_deref().map(parse_timestamp).transpose()?,
        selected_information_sources: row.get("selected_information_sources"),
        distinct_records: row.get("distinct_records"),
        result_count: row.get("result_count"),
    }))
}

fn parse_timestamp(value: &str) -> WsResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WsError::Internal(format!("Failed to parse timestamp {}: {}", value, e)))
}

/// Set the state of a task; terminal states also stamp `finished_at`
pub async fn update_state(
    conn: &mut SqliteConnection,
    project_id: &str,
    task_id: &str,
    state: PayloadState,
) -> WsResult<()> {
    let finished_at = state.is_terminal().then(|| Utc::now().to_rfc3339());

    let result = sqlx::query(
        "UPDATE weak_supervision_task SET state = ?, finished_at = ? WHERE id = ? AND project_id = ?",
    )
    .bind(state.as_str())
    .bind(finished_at)
    .bind(task_id)
    .bind(project_id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(WsError::NotFound(format!("weak supervision task {}", task_id)));
    }
    Ok(())
}

/// Replace the weak supervision associations of a labeling task and mark
/// the run successful
pub async fn store_predictions(
    conn: &mut SqliteConnection,
    project_id: &str,
    labeling_task_id: &str,
    user_id: &str,
    task_id: &str,
    predictions: &Predictions,
    summary: &RunSummary,
) -> WsResult<()> {
    sqlx::query(
        r#"
        DELETE FROM record_label_association
        WHERE project_id = ? AND source_type = ?
          AND labeling_task_label_id IN (
              SELECT id FROM labeling_task_label WHERE labeling_task_id = ?
          )
        "#,
    )
    .bind(project_id)
    .bind(SOURCE_TYPE_WEAK_SUPERVISION)
    .bind(labeling_task_id)
    .execute(&mut *conn)
    .await?;

    match predictions {
        Predictions::Classification(by_record) => {
            for (record_id, prediction) in by_record {
                insert_association(
                    conn,
                    project_id,
                    record_id,
                    &prediction.label_id,
                    prediction.confidence,
                    task_id,
                    user_id,
                )
                .await?;
            }
        }
        Predictions::Extraction(by_record) => {
            for (record_id, spans) in by_record {
                for span in spans {
                    let association_id = insert_association(
                        conn,
                        project_id,
                        record_id,
                        &span.label_id,
                        span.confidence,
                        task_id,
                        user_id,
                    )
                    .await?;

                    for token_index in span.start_token_index..=span.end_token_index {
                        sqlx::query(
                            r#"
                            INSERT INTO record_label_association_token (
                                id, project_id, record_label_association_id,
                                token_index, is_beginning_token
                            ) VALUES (?, ?, ?, ?, ?)
                            "#,
                        )
                        .bind(Uuid::new_v4().to_string())
                        .bind(project_id)
                        .bind(&association_id)
                        .bind(token_index)
                        .bind(token_index == span.start_token_index)
                        .execute(&mut *conn)
                        .await?;
                    }
                }
            }
        }
    }

    let result = sqlx::query(
        r#"
        UPDATE weak_supervision_task
        SET state = ?, finished_at = ?, selected_information_sources = ?,
            distinct_records = ?, result_count = ?
        WHERE id = ? AND project_id = ?
        "#,
    )
    .bind(PayloadState::Success.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(&summary.selected_information_sources)
    .bind(summary.distinct_records)
    .bind(predictions.result_count() as i64)
    .bind(task_id)
    .bind(project_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(WsError::NotFound(format!("weak supervision task {}", task_id)));
    }
    Ok(())
}

async fn insert_association(
    conn: &mut SqliteConnection,
    project_id: &str,
    record_id: &str,
    label_id: &str,
    confidence: f64,
    task_id: &str,
    user_id: &str,
) -> WsResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO record_label_association (
            id, project_id, record_id, labeling_task_label_id, source_id,
            source_type, confidence, weak_supervision_id, created_by, created_at
        ) VALUES (?, ?, ?, ?, NULL, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(project_id)
    .bind(record_id)
    .bind(label_id)
    .bind(SOURCE_TYPE_WEAK_SUPERVISION)
    .bind(confidence)
    .bind(task_id)
    .bind(user_id)
    .bind(Utc::now().to_rfc3339())
    .execute(conn)
    .await?;

    Ok(id)
}

/// Weak supervision association count of a labeling task
pub async fn count_results(conn: &mut SqliteConnection, labeling_task_id: &str) -> WsResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM record_label_association rla
        JOIN labeling_task_label l ON l.id = rla.labeling_task_label_id
        WHERE l.labeling_task_id = ? AND rla.source_type = ?
        "#,
    )
    .bind(labeling_task_id)
    .bind(SOURCE_TYPE_WEAK_SUPERVISION)
    .fetch_one(conn)
    .await?;

    Ok(count)
}
