//! Project lookups

use sqlx::SqliteConnection;

use crate::error::WsResult;

/// Organization owning a project, `None` for unknown projects
pub async fn get_organization_id(
    conn: &mut SqliteConnection,
    project_id: &str,
) -> WsResult<Option<String>> {
    let organization_id = sqlx::query_scalar("SELECT organization_id FROM project WHERE id = ?")
        .bind(project_id)
        .fetch_optional(conn)
        .await?;

    Ok(organization_id)
}
