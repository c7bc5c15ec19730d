//! HTTP implementations of the platform collaborator seams.
//!
//! The surrounding platform owns notifications and permissions; the
//! daemon reaches it over two small JSON endpoints. Both collaborators
//! are black boxes behind the traits defined in `maildesk-core`.

use std::time::Duration;

use maildesk_core::{
    AgentId, Authorizer, Error, NotificationEvent, Notifier, Result, WorkspaceId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const PLATFORM_TIMEOUT: Duration = Duration::from_secs(10);

fn platform_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PLATFORM_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Delivers notification events to the platform.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpNotifier {
    /// Create a notifier against the platform base URL.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: platform_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

impl Notifier for HttpNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let mut request = self
            .http
            .post(format!("{}/internal/notifications", self.base_url))
            .json(event);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Collaborator(format!("notification call failed: {e}")))?;

        if response.status().is_success() {
            debug!(
                "notified platform about message {} on conversation {}",
                event.message_id, event.conversation_id
            );
            Ok(())
        } else {
            Err(Error::Collaborator(format!(
                "platform rejected notification: {}",
                response.status()
            )))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionQuery<'a> {
    agent_id: &'a str,
    workspace_id: &'a str,
    permission: &'a str,
}

#[derive(Deserialize)]
struct PermissionGrant {
    allowed: bool,
}

/// Asks the platform's permission engine yes/no questions.
#[derive(Debug, Clone)]
pub struct HttpAuthorizer {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpAuthorizer {
    /// Create an authorizer against the platform base URL.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: platform_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

impl Authorizer for HttpAuthorizer {
    async fn allows(
        &self,
        agent: &AgentId,
        workspace: &WorkspaceId,
        permission: &str,
    ) -> Result<bool> {
        let mut request = self
            .http
            .post(format!("{}/internal/permissions/check", self.base_url))
            .json(&PermissionQuery {
                agent_id: agent.as_str(),
                workspace_id: workspace.as_str(),
                permission,
            });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Collaborator(format!("permission check failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Collaborator(format!(
                "permission engine answered {}",
                response.status()
            )));
        }

        let grant: PermissionGrant = response
            .json()
            .await
            .map_err(|e| Error::Collaborator(format!("unreadable permission answer: {e}")))?;
        Ok(grant.allowed)
    }
}
