//! Database initialization
//!
//! Creates the labeling tables on first run. Every `create_*_table` function
//! is idempotent (`CREATE TABLE IF NOT EXISTS`), so startup can always call
//! [`create_schema`].

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (or create) the database file and make sure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA busy_timeout = 5000")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// The pool is pinned to one connection that never expires, otherwise every
/// new connection would see its own empty `:memory:` database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_project_table(pool).await?;
    create_labeling_task_table(pool).await?;
    create_labeling_task_label_table(pool).await?;
    create_information_source_table(pool).await?;
    create_record_label_association_table(pool).await?;
    create_record_label_association_token_table(pool).await?;
    create_information_source_statistics_table(pool).await?;
    create_information_source_statistics_exclusion_table(pool).await?;
    create_weak_supervision_task_table(pool).await?;
    create_notification_table(pool).await?;

    info!("Database schema ready");
    Ok(())
}

pub async fn create_project_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// `task_type` is stored as free text; services reject unknown values
pub async fn create_labeling_task_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS labeling_task (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            task_type TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_labeling_task_label_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS labeling_task_label (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(id) ON DELETE CASCADE,
            labeling_task_id TEXT NOT NULL REFERENCES labeling_task(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_information_source_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS information_source (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(id) ON DELETE CASCADE,
            labeling_task_id TEXT NOT NULL REFERENCES labeling_task(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            is_selected INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Whole-record associations; extraction associations additionally own
/// rows in `record_label_association_token`
pub async fn create_record_label_association_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS record_label_association (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(id) ON DELETE CASCADE,
            record_id TEXT NOT NULL,
            labeling_task_label_id TEXT NOT NULL REFERENCES labeling_task_label(id) ON DELETE CASCADE,
            source_id TEXT REFERENCES information_source(id) ON DELETE CASCADE,
            source_type TEXT NOT NULL,
            confidence REAL,
            weak_supervision_id TEXT,
            created_by TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_rla_source ON record_label_association(source_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_rla_label ON record_label_association(labeling_task_label_id, source_type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_record_label_association_token_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS record_label_association_token (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(id) ON DELETE CASCADE,
            record_label_association_id TEXT NOT NULL
                REFERENCES record_label_association(id) ON DELETE CASCADE,
            token_index INTEGER NOT NULL,
            is_beginning_token INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per (source, label); quality and quantity columns are written
/// by different flows, so all of them are nullable
pub async fn create_information_source_statistics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS information_source_statistics (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(id) ON DELETE CASCADE,
            source_id TEXT NOT NULL REFERENCES information_source(id) ON DELETE CASCADE,
            labeling_task_label_id TEXT NOT NULL REFERENCES labeling_task_label(id) ON DELETE CASCADE,
            true_positives INTEGER,
            false_positives INTEGER,
            false_negatives INTEGER,
            record_coverage INTEGER,
            total_hits INTEGER,
            source_conflicts INTEGER,
            source_overlaps INTEGER,
            UNIQUE(source_id, labeling_task_label_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_information_source_statistics_exclusion_table(
    pool: &SqlitePool,
) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS information_source_statistics_exclusion (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(id) ON DELETE CASCADE,
            source_id TEXT NOT NULL REFERENCES information_source(id) ON DELETE CASCADE,
            record_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_weak_supervision_task_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weak_supervision_task (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES project(id) ON DELETE CASCADE,
            labeling_task_id TEXT NOT NULL REFERENCES labeling_task(id) ON DELETE CASCADE,
            state TEXT NOT NULL,
            created_by TEXT,
            created_at TEXT NOT NULL,
            finished_at TEXT,
            selected_information_sources TEXT,
            distinct_records INTEGER,
            result_count INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_notification_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notification (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            message TEXT NOT NULL,
            level TEXT NOT NULL,
            type TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
