//! Information source lookups, statistics exclusions and stored statistics

use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::WsResult;
use crate::models::{InformationSource, QualityStats, QuantityStats};

/// Stored statistics row of one (source, label)
///
/// Quality and quantity columns are written independently, so either half
/// may be unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredStatistics {
    pub source_id: String,
    pub labeling_task_label_id: String,
    pub true_positives: Option<i64>,
    pub false_positives: Option<i64>,
    pub false_negatives: Option<i64>,
    pub record_coverage: Option<i64>,
    pub total_hits: Option<i64>,
    pub source_conflicts: Option<i64>,
    pub source_overlaps: Option<i64>,
}

pub async fn get(
    conn: &mut SqliteConnection,
    project_id: &str,
    source_id: &str,
) -> WsResult<Option<InformationSource>> {
    let row = sqlx::query(
        r#"
        SELECT id, project_id, labeling_task_id, name, is_selected
        FROM information_source
        WHERE id = ? AND project_id = ?
        "#,
    )
    .bind(source_id)
    .bind(project_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|r| InformationSource {
        id: r.get("id"),
        project_id: r.get("project_id"),
        labeling_task_id: r.get("labeling_task_id"),
        name: r.get("name"),
        is_selected: r.get("is_selected"),
    }))
}

/// Excluded record ids of every source in a labeling task
pub async fn exclusion_record_ids_for_task(
    conn: &mut SqliteConnection,
    labeling_task_id: &str,
) -> WsResult<HashSet<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT e.record_id
        FROM information_source_statistics_exclusion e
        JOIN information_source s ON s.id = e.source_id
        WHERE s.labeling_task_id = ?
        "#,
    )
    .bind(labeling_task_id)
    .fetch_all(conn)
    .await?;

    Ok(ids.into_iter().collect())
}

/// Excluded record ids of one source
pub async fn exclusion_record_ids(
    conn: &mut SqliteConnection,
    source_id: &str,
) -> WsResult<HashSet<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT record_id FROM information_source_statistics_exclusion WHERE source_id = ?",
    )
    .bind(source_id)
    .fetch_all(conn)
    .await?;

    Ok(ids.into_iter().collect())
}

/// Insert or update the quality columns of one (source, label)
pub async fn update_quality_stats(
    conn: &mut SqliteConnection,
    project_id: &str,
    source_id: &str,
    label_id: &str,
    stats: &QualityStats,
) -> WsResult<()> {
    sqlx::query(
        r#"
        INSERT INTO information_source_statistics (
            id, project_id, source_id, labeling_task_label_id,
            true_positives, false_positives, false_negatives
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, labeling_task_label_id) DO UPDATE SET
            true_positives = excluded.true_positives,
            false_positives = excluded.false_positives,
            false_negatives = excluded.false_negatives
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(project_id)
    .bind(source_id)
    .bind(label_id)
    .bind(stats.true_positives)
    .bind(stats.false_positives)
    .bind(stats.false_negatives)
    .execute(conn)
    .await?;

    Ok(())
}

/// Insert or update the quantity columns of one (source, label)
pub async fn update_quantity_stats(
    conn: &mut SqliteConnection,
    project_id: &str,
    source_id: &str,
    label_id: &str,
    stats: &QuantityStats,
) -> WsResult<()> {
    sqlx::query(
        r#"
        INSERT INTO information_source_statistics (
            id, project_id, source_id, labeling_task_label_id,
            record_coverage, total_hits, source_conflicts, source_overlaps
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, labeling_task_label_id) DO UPDATE SET
            record_coverage = excluded.record_coverage,
            total_hits = excluded.total_hits,
            source_conflicts = excluded.source_conflicts,
            source_overlaps = excluded.source_overlaps
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(project_id)
    .bind(source_id)
    .bind(label_id)
    .bind(stats.record_coverage)
    .bind(stats.total_hits)
    .bind(stats.source_conflicts)
    .bind(stats.source_overlaps)
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete every stored statistics row of a source
pub async fn delete_stats(
    conn: &mut SqliteConnection,
    project_id: &str,
    source_id: &str,
) -> WsResult<u64> {
    let result = sqlx::query(
        "DELETE FROM information_source_statistics WHERE project_id = ? AND source_id = ?",
    )
    .bind(project_id)
    .bind(source_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Stored statistics of a source, ordered by label id
pub async fn get_statistics(
    conn: &mut SqliteConnection,
    source_id: &str,
) -> WsResult<Vec<StoredStatistics>> {
    let rows = sqlx::query(
        r#"
        SELECT source_id, labeling_task_label_id,
               true_positives, false_positives, false_negatives,
               record_coverage, total_hits, source_conflicts, source_overlaps
        FROM information_source_statistics
        WHERE source_id = ?
        ORDER BY labeling_task_label_id
        "#,
    )
    .bind(source_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| StoredStatistics {
            source_id: r.get("source_id"),
            labeling_task_label_id: r.get("labeling_task_label_id"),
            true_positives: r.get("true_positives"),
            false_positives: r.get("false_positives"),
            false_negatives: r.get("false_negatives"),
            record_coverage: r.get("record_coverage"),
            total_hits: r.get("total_hits"),
            source_conflicts: r.get("source_conflicts"),
            source_overlaps: r.get("source_overlaps"),
        })
        .collect())
}
