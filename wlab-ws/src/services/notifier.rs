//! Notifier
//!
//! Persists user notifications for recovered pipeline conditions and pushes
//! realtime updates to the websocket gateway (`POST {endpoint}/notify`).
//! Delivery failures are logged and never returned to the caller.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::db::{notifications, projects, Session};
use crate::error::{WsError, WsResult};

pub const NO_REFERENCE_DATA_MESSAGE: &str =
    "You have no labeled data. Can't compute true positive-related statistics.";
pub const NO_COVERAGE_DATA_MESSAGE: &str =
    "Your heuristics hits no records in the project. Can't compute statistics.";

const USER_AGENT: &str = concat!("wlab-ws/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct NotifyPayload<'a> {
    organization: &'a str,
    message: &'a str,
}

/// Prefix a message with its broadcast scope
pub fn scoped_message(project_id: &str, message: &str, is_global: bool) -> String {
    if is_global {
        format!("GLOBAL:{}", message)
    } else {
        format!("{}:{}", project_id, message)
    }
}

#[derive(Clone)]
pub struct Notifier {
    endpoint: Option<String>,
    http_client: reqwest::Client,
}

impl Notifier {
    pub fn new(endpoint: Option<String>) -> WsResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WsError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub async fn send_warning_no_reference_data(
        &self,
        session: &mut Session,
        project_id: &str,
        user_id: &str,
    ) -> WsResult<()> {
        self.send_warning(session, project_id, user_id, NO_REFERENCE_DATA_MESSAGE)
            .await
    }

    pub async fn send_warning_no_coverage_data(
        &self,
        session: &mut Session,
        project_id: &str,
        user_id: &str,
    ) -> WsResult<()> {
        self.send_warning(session, project_id, user_id, NO_COVERAGE_DATA_MESSAGE)
            .await
    }

    async fn send_warning(
        &self,
        session: &mut Session,
        project_id: &str,
        user_id: &str,
        message: &str,
    ) -> WsResult<()> {
        notifications::create(
            session.conn().await?,
            project_id,
            user_id,
            message,
            notifications::LEVEL_WARNING,
            notifications::TYPE_MISSING_REFERENCE_DATA,
        )
        .await?;
        session.commit().await?;

        let organization_id = projects::get_organization_id(session.conn().await?, project_id).await?;
        if let Some(organization_id) = organization_id {
            self.send_organization_update(
                session,
                project_id,
                &format!("notification_created:{}", user_id),
                true,
                Some(&organization_id),
            )
            .await?;
        }
        Ok(())
    }

    /// Broadcast a message to every client of the project's organization
    pub async fn send_organization_update(
        &self,
        session: &mut Session,
        project_id: &str,
        message: &str,
        is_global: bool,
        organization_id: Option<&str>,
    ) -> WsResult<()> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            warn!("WS_NOTIFY_ENDPOINT not set, skipping notification update");
            return Ok(());
        };

        let message = scoped_message(project_id, message, is_global);
        let organization_id = match organization_id {
            Some(id) => id.to_string(),
            None => match projects::get_organization_id(session.conn().await?, project_id).await? {
                Some(id) => id,
                None => {
                    warn!(project_id = %project_id, "Unknown project, skipping notification update");
                    return Ok(());
                }
            },
        };

        let url = format!("{}/notify", endpoint);
        let result = self
            .http_client
            .post(&url)
            .json(&NotifyPayload {
                organization: &organization_id,
                message: &message,
            })
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                debug!(organization_id = %organization_id, message = %message, "Notification update sent");
            }
            Ok(response) => {
                warn!(
                    status = response.status().as_u16(),
                    url = %url,
                    "Could not send notification update"
                );
            }
            Err(e) => {
                warn!(error = %e, url = %url, "Could not send notification update");
            }
        }
        Ok(())
    }
}
