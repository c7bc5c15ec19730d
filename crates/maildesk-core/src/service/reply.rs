//! Outbound reply composition.

use std::future::Future;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{mint_email_message_id, permissions};
use crate::conversation::ConversationId;
use crate::jobs::{JobKind, SendEmailJob};
use crate::message::{
    Attachment, DeliveryStatus, EmailMetadata, MessageId, NewMessage, SenderType,
};
use crate::normalize::normalize_subject;
use crate::store::Database;
use crate::tenant::{AgentId, WorkspaceId};
use crate::thread::NewThreadRecord;
use crate::{Error, Result};

/// Seam to the platform's permission engine.
///
/// The platform owns roles and memberships; the engine only asks yes/no
/// questions about one agent, one workspace, and one permission name
/// from [`permissions`].
pub trait Authorizer: Send + Sync {
    /// Whether the agent holds the permission in the workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the permission engine could not be reached;
    /// callers treat that as a denial.
    fn allows(
        &self,
        agent: &AgentId,
        workspace: &WorkspaceId,
        permission: &str,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// An agent's request to reply on a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    /// The agent sending the reply. Must equal the authenticated caller.
    pub agent_id: AgentId,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    #[serde(default)]
    pub cc: Vec<String>,
    /// BCC addresses.
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
    /// Plain-text body, if composed.
    #[serde(default)]
    pub text_body: Option<String>,
    /// Message-ID of the email being replied to; drives the threading
    /// headers. Absent for a fresh outbound email on the conversation.
    #[serde(default)]
    pub reply_to_message_id: Option<String>,
    /// Attachment references.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// What [`ReplyComposer::send_email_reply`] produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyReceipt {
    /// The stored outbound message, `delivery_status = pending`.
    pub message_id: MessageId,
    /// The minted email Message-ID the provider will transmit.
    pub email_message_id: String,
}

/// The outbound reply pipeline.
#[derive(Debug, Clone)]
pub struct ReplyComposer {
    mail_domain: String,
}

impl ReplyComposer {
    /// Create the composer for one deployment's mail domain.
    pub fn new(mail_domain: impl Into<String>) -> Self {
        Self {
            mail_domain: mail_domain.into(),
        }
    }

    /// Compose and persist a threaded reply, then enqueue its delivery.
    ///
    /// All checks precede all writes: the caller must be the request's
    /// agent, hold reply permission in the conversation's workspace, and
    /// the workspace's email channel must be configured and enabled. The
    /// reply is stored `pending` together with its thread index row; the
    /// actual provider send happens later on the worker, so this returns
    /// before any network traffic.
    ///
    /// # Errors
    ///
    /// - [`Error::Authorization`] when the caller is not the agent or
    ///   lacks reply permission.
    /// - [`Error::NotFound`] when the conversation does not exist.
    /// - [`Error::Config`] when the email channel is missing or disabled.
    pub async fn send_email_reply(
        &self,
        db: &Database,
        authorizer: &impl Authorizer,
        caller: &AgentId,
        conversation_id: ConversationId,
        request: &ReplyRequest,
    ) -> Result<ReplyReceipt> {
        if *caller != request.agent_id {
            return Err(Error::Authorization(
                "caller does not match the replying agent".into(),
            ));
        }

        let conversation = db
            .conversations()
            .get(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;

        let allowed = authorizer
            .allows(
                caller,
                &conversation.workspace_id,
                permissions::CONVERSATIONS_REPLY,
            )
            .await?;
        if !allowed {
            return Err(Error::Authorization(format!(
                "agent {caller} may not reply in workspace {}",
                conversation.workspace_id
            )));
        }

        let config = db
            .configs()
            .get(&conversation.workspace_id)
            .await?
            .ok_or_else(|| Error::Config("email channel is not configured".into()))?;
        if !config.enabled {
            return Err(Error::Config("email channel is disabled".into()));
        }

        let email_message_id =
            mint_email_message_id(&conversation.workspace_id, &self.mail_domain);

        // Threading: the new email's References chain is the replied-to
        // email's chain with that email appended.
        let (in_reply_to, references) = match &request.reply_to_message_id {
            Some(reply_to) => {
                let mut references = db
                    .threads()
                    .find_in_workspace(&conversation.workspace_id, reply_to)
                    .await?
                    .map(|thread| thread.references)
                    .unwrap_or_default();
                references.push(reply_to.clone());
                (Some(reply_to.clone()), references)
            }
            None => (None, Vec::new()),
        };

        let message = db
            .messages()
            .insert(&NewMessage {
                conversation_id,
                workspace_id: conversation.workspace_id.clone(),
                sender_type: SenderType::Agent,
                sender_id: caller.to_string(),
                body_html: Some(request.html_body.clone()),
                body_text: request.text_body.clone(),
                email_metadata: EmailMetadata {
                    subject: request.subject.clone(),
                    from: config.from_header(),
                    to: request.to.clone(),
                    cc: request.cc.clone(),
                    bcc: request.bcc.clone(),
                    message_id: email_message_id.clone(),
                    in_reply_to: in_reply_to.clone(),
                    references: references.clone(),
                    attachments: request.attachments.clone(),
                },
                delivery_status: Some(DeliveryStatus::Pending),
                sent_at: Utc::now(),
            })
            .await?;

        let inserted = db
            .threads()
            .insert(&NewThreadRecord {
                workspace_id: conversation.workspace_id.clone(),
                conversation_id,
                message_id: email_message_id.clone(),
                in_reply_to,
                references,
                subject: request.subject.clone(),
                normalized_subject: normalize_subject(&request.subject),
                sender_email: config.from_email.to_lowercase(),
            })
            .await?;
        if !inserted {
            // A minted ID collided, which means the clock or the RNG is
            // broken; refuse rather than corrupt the thread index.
            db.messages().delete(message.id).await?;
            return Err(Error::Config(format!(
                "minted Message-ID {email_message_id} already exists"
            )));
        }

        db.conversations()
            .record_outbound(conversation_id, message.sent_at)
            .await?;

        db.jobs()
            .enqueue(
                JobKind::SendEmail,
                &SendEmailJob {
                    message_id: message.id,
                },
            )
            .await?;

        debug!(
            "queued reply {email_message_id} on conversation {conversation_id} by {caller}"
        );

        Ok(ReplyReceipt {
            message_id: message.id,
            email_message_id,
        })
    }
}
