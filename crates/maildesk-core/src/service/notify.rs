//! Notification events handed to the platform.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::conversation::ConversationId;
use crate::message::{Message, MessageId, SenderType};

/// What happened, from the platform's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An email arrived on an existing (or reopened) conversation.
    NewMessage,
    /// An email started a brand-new conversation.
    NewConversation,
}

/// Fire-and-forget event describing one new message.
///
/// Serialized as the payload of a notify job and delivered to the
/// platform by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// What happened.
    pub kind: NotificationKind,
    /// Conversation the message landed on.
    pub conversation_id: ConversationId,
    /// Body text of the message.
    pub message_content: String,
    /// Who authored the message.
    pub sender_type: SenderType,
    /// The message itself.
    pub message_id: MessageId,
    /// Platform identifier of the author.
    pub sender_id: String,
    /// When the message was sent or received.
    pub sent_at: DateTime<Utc>,
    /// Originating channel; always `"email"` here.
    pub channel: String,
}

impl NotificationEvent {
    /// Build the event for a freshly ingested or composed message.
    #[must_use]
    pub fn for_message(kind: NotificationKind, message: &Message) -> Self {
        Self {
            kind,
            conversation_id: message.conversation_id,
            message_content: message.content().to_string(),
            sender_type: message.sender_type,
            message_id: message.id,
            sender_id: message.sender_id.clone(),
            sent_at: message.sent_at,
            channel: "email".to_string(),
        }
    }
}

/// Seam to the platform's notification collaborator.
///
/// Called by the worker, never from inside a pipeline; a failing
/// notifier delays notifications but never ingestion.
pub trait Notifier: Send + Sync {
    /// Deliver one event to the platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform could not be reached or rejected
    /// the event; the worker retries with backoff.
    fn notify(&self, event: &NotificationEvent) -> impl Future<Output = Result<()>> + Send;
}
