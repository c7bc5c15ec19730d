//! HTTP surface of the daemon.
//!
//! Three webhook endpoints for the mail provider and three endpoints for
//! the platform's agents. Webhooks authenticate with the shared secret
//! (enforced inside the engine, fail-closed); agent endpoints carry the
//! authenticated agent in a header and are checked against the
//! platform's permission engine.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::warn;

use maildesk_core::service::permissions;
use maildesk_core::{
    AgentId, Authorizer, ConversationId, Database, EmailConfig, EmailIngress, EmailSettings,
    Error, ForwardedEmail, InboundEmail, IngressReceipt, ReconcileOutcome, ReplyComposer,
    ReplyReceipt, ReplyRequest, WebhookPolicy, WorkspaceId,
    update_delivery_status_by_external_id,
};
use maildesk_transport::DeliveryEvent;

use crate::collab::HttpAuthorizer;

/// Shared state handed to every handler.
pub struct AppState {
    /// Engine database.
    pub db: Database,
    /// Inbound ingestion pipelines.
    pub ingress: EmailIngress,
    /// Outbound reply pipeline.
    pub composer: ReplyComposer,
    /// Webhook secret policy, shared with the ingress pipelines.
    pub policy: WebhookPolicy,
    /// Platform permission engine.
    pub authorizer: HttpAuthorizer,
    /// Domain forwarding addresses live under.
    pub mail_domain: String,
}

/// Build the daemon's router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/email/inbound/{workspace_id}", post(inbound_webhook))
        .route(
            "/webhooks/email/forwarded/{workspace_id}",
            post(forwarded_webhook),
        )
        .route("/webhooks/email/delivery", post(delivery_webhook))
        .route("/conversations/{conversation_id}/reply", post(send_reply))
        .route("/workspaces/{workspace_id}/email/config", put(put_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn inbound_webhook(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
    headers: HeaderMap,
    Json(email): Json<InboundEmail>,
) -> Result<Json<IngressReceipt>, ApiError> {
    let receipt = state
        .ingress
        .process_inbound_email(
            &state.db,
            webhook_secret(&headers),
            &WorkspaceId::new(workspace_id),
            &email,
        )
        .await?;
    Ok(Json(receipt))
}

async fn forwarded_webhook(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
    headers: HeaderMap,
    Json(email): Json<ForwardedEmail>,
) -> Result<Json<IngressReceipt>, ApiError> {
    let receipt = state
        .ingress
        .process_forwarded_email(
            &state.db,
            webhook_secret(&headers),
            &WorkspaceId::new(workspace_id),
            &email,
        )
        .await?;
    Ok(Json(receipt))
}

/// Delivery outcomes always answer 200: the provider retries on other
/// statuses, and a payload the engine dropped on purpose (unknown ID,
/// conversation mismatch) will never apply, however often it is resent.
async fn delivery_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<DeliveryEvent>,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    state.policy.authorize(webhook_secret(&headers))?;

    let outcome =
        update_delivery_status_by_external_id(&state.db, &event.external_email_id, event.status)
            .await?;
    if !outcome.is_updated() {
        warn!(
            "dropped delivery webhook for {}: {outcome:?}",
            event.external_email_id
        );
    }
    Ok(Json(outcome))
}

async fn send_reply(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<ReplyReceipt>, ApiError> {
    let caller = agent_header(&headers)?;
    let receipt = state
        .composer
        .send_email_reply(
            &state.db,
            &state.authorizer,
            &caller,
            ConversationId::new(conversation_id),
            &request,
        )
        .await?;
    Ok(Json(receipt))
}

async fn put_config(
    State(state): State<Arc<AppState>>,
    Path(workspace_id): Path<String>,
    headers: HeaderMap,
    Json(settings): Json<EmailSettings>,
) -> Result<Json<EmailConfig>, ApiError> {
    let caller = agent_header(&headers)?;
    let workspace = WorkspaceId::new(workspace_id);

    let allowed = state
        .authorizer
        .allows(&caller, &workspace, permissions::SETTINGS_INTEGRATIONS)
        .await?;
    if !allowed {
        return Err(Error::Authorization(format!(
            "agent {caller} may not administer workspace {workspace}"
        ))
        .into());
    }

    let config = state
        .db
        .configs()
        .ensure(&workspace, &state.mail_domain, &settings)
        .await?;
    Ok(Json(config))
}

fn webhook_secret(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-webhook-secret")
        .and_then(|value| value.to_str().ok())
}

fn agent_header(headers: &HeaderMap) -> Result<AgentId, ApiError> {
    headers
        .get("x-agent-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(AgentId::new)
        .ok_or_else(|| Error::Authorization("missing x-agent-id header".into()).into())
}

/// Engine errors mapped onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Authorization(_) => StatusCode::UNAUTHORIZED,
            Error::Config(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Collaborator(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Serde(_) | Error::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {}", self.0);
        }
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError(Error::Authorization("no".into())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError(Error::Config("off".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(Error::NotFound("gone".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(Error::Collaborator("down".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_agent_header_extraction() {
        let mut headers = HeaderMap::new();
        assert!(agent_header(&headers).is_err());

        headers.insert("x-agent-id", "agent-1".parse().unwrap());
        assert_eq!(agent_header(&headers).unwrap(), AgentId::new("agent-1"));
    }

    #[test]
    fn test_webhook_secret_extraction() {
        let mut headers = HeaderMap::new();
        assert!(webhook_secret(&headers).is_none());

        headers.insert("x-webhook-secret", "s3cret".parse().unwrap());
        assert_eq!(webhook_secret(&headers), Some("s3cret"));
    }
}
