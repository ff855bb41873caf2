//! Health check endpoint

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tracing::warn;

use crate::db::Session;
use crate::AppState;

/// GET /healthcheck
///
/// "OK" when the database answers, 500 with the storage error otherwise.
pub async fn healthcheck(State(state): State<AppState>) -> (StatusCode, String) {
    let mut session = Session::new(state.db.clone());

    let result = match session.conn().await {
        Ok(conn) => sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(conn)
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => (StatusCode::OK, "OK".to_string()),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/healthcheck", get(healthcheck))
}
