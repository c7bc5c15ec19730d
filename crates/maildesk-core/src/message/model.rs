//! Message model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;
use crate::tenant::WorkspaceId;

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Create a new message ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the conversation authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    /// The customer.
    Visitor,
    /// A support agent.
    Agent,
}

impl SenderType {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "agent" => Self::Agent,
            _ => Self::Visitor,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Visitor => "visitor",
            Self::Agent => "agent",
        }
    }
}

/// Lifecycle of an outbound email as reported by the transport.
///
/// `Pending → Sent` is recorded by the dispatcher; `Delivered`/`Bounced`
/// arrive later over the provider's webhook; `Failed` is terminal for
/// sends the provider rejected or that exhausted their retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Enqueued, not yet handed to the provider.
    #[default]
    Pending,
    /// Accepted by the provider's send API.
    Sent,
    /// Accepted by the recipient server.
    Delivered,
    /// Rejected by the recipient server.
    Bounced,
    /// Send failed permanently.
    Failed,
}

impl DeliveryStatus {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "bounced" => Self::Bounced,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Bounced => "bounced",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// An attachment carried on a message, by reference only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// File name shown to the recipient.
    pub file_name: String,
    /// MIME type, if known.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Content size in bytes, if known.
    #[serde(default)]
    pub size_bytes: Option<i64>,
    /// Location of the content.
    #[serde(default)]
    pub url: Option<String>,
}

/// The email-specific headers and routing data carried on a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMetadata {
    /// Subject as it appeared on the wire.
    pub subject: String,
    /// Raw `From` header value.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    #[serde(default)]
    pub cc: Vec<String>,
    /// BCC addresses.
    #[serde(default)]
    pub bcc: Vec<String>,
    /// The email's Message-ID. Synthetic for outbound email.
    pub message_id: String,
    /// `In-Reply-To` header, if present.
    #[serde(default)]
    pub in_reply_to: Option<String>,
    /// `References` chain in header order.
    #[serde(default)]
    pub references: Vec<String>,
    /// Attachment references.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// One email on a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Workspace this message belongs to.
    pub workspace_id: WorkspaceId,
    /// Who authored the message.
    pub sender_type: SenderType,
    /// Platform identifier of the author: visitor ID or agent ID.
    pub sender_id: String,
    /// HTML body, if any.
    pub body_html: Option<String>,
    /// Plain-text body, if any.
    pub body_text: Option<String>,
    /// Email headers and routing data.
    pub email_metadata: EmailMetadata,
    /// Delivery lifecycle; `None` for inbound email.
    pub delivery_status: Option<DeliveryStatus>,
    /// When the email was sent or received.
    pub sent_at: DateTime<Utc>,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Body text used in notification payloads: plain text when present,
    /// HTML otherwise.
    #[must_use]
    pub fn content(&self) -> &str {
        self.body_text
            .as_deref()
            .or(self.body_html.as_deref())
            .unwrap_or_default()
    }
}

/// Input for inserting a message row.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Workspace the message belongs to.
    pub workspace_id: WorkspaceId,
    /// Who authored the message.
    pub sender_type: SenderType,
    /// Platform identifier of the author.
    pub sender_id: String,
    /// HTML body, if any.
    pub body_html: Option<String>,
    /// Plain-text body, if any.
    pub body_text: Option<String>,
    /// Email headers and routing data.
    pub email_metadata: EmailMetadata,
    /// `Some(Pending)` for outbound email, `None` for inbound.
    pub delivery_status: Option<DeliveryStatus>,
    /// When the email was sent or received.
    pub sent_at: DateTime<Utc>,
}
