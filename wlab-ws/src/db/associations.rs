//! Record label association queries
//!
//! Weak rows are read through `information_source` (source belongs to the
//! task), manual rows through `labeling_task_label` (label belongs to the
//! task). Rows come back in insertion order.

use sqlx::{Row, SqliteConnection};

use crate::error::WsResult;
use crate::models::{
    ClassificationRow, TokenRow, SOURCE_TYPE_INFORMATION_SOURCE, SOURCE_TYPE_MANUAL,
};

/// Which associations of a labeling task to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationScope {
    /// Information source rows of every source
    AllSources,
    /// Information source rows of selected sources only
    SelectedSources,
    /// Manual reference rows
    Manual,
}

impl AssociationScope {
    fn filter(&self) -> &'static str {
        match self {
            AssociationScope::AllSources => {
                "JOIN information_source s ON s.id = rla.source_id \
                 WHERE rla.project_id = ? AND s.labeling_task_id = ? AND rla.source_type = ?"
            }
            AssociationScope::SelectedSources => {
                "JOIN information_source s ON s.id = rla.source_id \
                 WHERE rla.project_id = ? AND s.labeling_task_id = ? AND rla.source_type = ? \
                 AND s.is_selected = 1"
            }
            AssociationScope::Manual => {
                "JOIN labeling_task_label l ON l.id = rla.labeling_task_label_id \
                 WHERE rla.project_id = ? AND l.labeling_task_id = ? AND rla.source_type = ?"
            }
        }
    }

    fn source_type(&self) -> &'static str {
        match self {
            AssociationScope::Manual => SOURCE_TYPE_MANUAL,
            _ => SOURCE_TYPE_INFORMATION_SOURCE,
        }
    }

    fn is_manual(&self) -> bool {
        matches!(self, AssociationScope::Manual)
    }
}

/// Whole-record associations of a classification task
pub async fn classification_rows(
    conn: &mut SqliteConnection,
    project_id: &str,
    labeling_task_id: &str,
    scope: AssociationScope,
) -> WsResult<Vec<ClassificationRow>> {
    let sql = format!(
        "SELECT rla.record_id, rla.source_id, rla.source_type, rla.confidence, \
         rla.labeling_task_label_id FROM record_label_association rla {} ORDER BY rla.rowid",
        scope.filter()
    );

    let rows = sqlx::query(&sql)
        .bind(project_id)
        .bind(labeling_task_id)
        .bind(scope.source_type())
        .fetch_all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|r| ClassificationRow {
            record_id: r.get("record_id"),
            source_id: if scope.is_manual() { None } else { r.get("source_id") },
            source_type: r.get("source_type"),
            confidence: r.get("confidence"),
            label_id: r.get("labeling_task_label_id"),
        })
        .collect())
}

/// Token-level associations of an extraction task
pub async fn token_rows(
    conn: &mut SqliteConnection,
    project_id: &str,
    labeling_task_id: &str,
    scope: AssociationScope,
) -> WsResult<Vec<TokenRow>> {
    let sql = format!(
        "SELECT rla.record_id, rla.source_id, rla.source_type, rla.confidence, \
         rla.labeling_task_label_id, t.token_index, t.is_beginning_token \
         FROM record_label_association rla \
         JOIN record_label_association_token t ON t.record_label_association_id = rla.id \
         {} ORDER BY rla.rowid, t.token_index",
        scope.filter()
    );

    let rows = sqlx::query(&sql)
        .bind(project_id)
        .bind(labeling_task_id)
        .bind(scope.source_type())
        .fetch_all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|r| TokenRow {
            record_id: r.get("record_id"),
            source_id: if scope.is_manual() { None } else { r.get("source_id") },
            source_type: r.get("source_type"),
            confidence: r.get("confidence"),
            label_id: r.get("labeling_task_label_id"),
            token_index: r.get("token_index"),
            is_beginning_token: r.get("is_beginning_token"),
        })
        .collect())
}

/// Number of manually labeled records in a labeling task
pub async fn count_manual_records(
    conn: &mut SqliteConnection,
    project_id: &str,
    labeling_task_id: &str,
) -> WsResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT rla.record_id)
        FROM record_label_association rla
        JOIN labeling_task_label l ON l.id = rla.labeling_task_label_id
        WHERE rla.project_id = ? AND l.labeling_task_id = ? AND rla.source_type = ?
        "#,
    )
    .bind(project_id)
    .bind(labeling_task_id)
    .bind(SOURCE_TYPE_MANUAL)
    .fetch_one(conn)
    .await?;

    Ok(count)
}
