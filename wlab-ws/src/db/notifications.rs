//! User notifications

use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::error::WsResult;

pub const LEVEL_WARNING: &str = "WARNING";
pub const TYPE_MISSING_REFERENCE_DATA: &str = "MISSING_REFERENCE_DATA";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub message: String,
    pub level: String,
    pub notification_type: String,
    pub created_at: String,
}

pub async fn create(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
    message: &str,
    level: &str,
    notification_type: &str,
) -> WsResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO notification (id, project_id, user_id, message, level, type, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(project_id)
    .bind(user_id)
    .bind(message)
    .bind(level)
    .bind(notification_type)
    .bind(Utc::now().to_rfc3339())
    .execute(conn)
    .await?;

    Ok(id)
}

/// Notifications of a user in a project, oldest first
pub async fn list_for_user(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
) -> WsResult<Vec<Notification>> {
    let rows = sqlx::query(
        r#"
        SELECT id, project_id, user_id, message, level, type, created_at
        FROM notification
        WHERE project_id = ? AND user_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Notification {
            id: r.get("id"),
            project_id: r.get("project_id"),
            user_id: r.get("user_id"),
            message: r.get("message"),
            level: r.get("level"),
            notification_type: r.get("type"),
            created_at: r.get("created_at"),
        })
        .collect())
}
