//! Conversation model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::WorkspaceId;
use crate::visitor::VisitorId;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub i64);

impl ConversationId {
    /// Create a new conversation ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a conversation sits in the agent's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Active and visible in the inbox.
    #[default]
    Open,
    /// Resolved; a matched inbound email reopens it.
    Closed,
    /// Hidden until a later time. A matched inbound email does not
    /// change it.
    Snoozed,
}

impl ConversationStatus {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "closed" => Self::Closed,
            "snoozed" => Self::Snoozed,
            _ => Self::Open,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Snoozed => "snoozed",
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// A thread container on the email channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Workspace this conversation belongs to.
    pub workspace_id: WorkspaceId,
    /// The customer side of the conversation.
    pub visitor_id: VisitorId,
    /// Originating channel; always `"email"` for rows created here.
    pub channel: String,
    /// Subject as shown to agents.
    pub subject: String,
    /// Inbox status.
    pub status: ConversationStatus,
    /// Unread badge on the agent side.
    pub unread_by_agent: u32,
    /// Unread badge on the visitor side.
    pub unread_by_visitor: u32,
    /// Timestamp of the latest message, used for inbox ordering.
    pub last_message_at: DateTime<Utc>,
    /// When the conversation started.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether the conversation is currently open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, ConversationStatus::Open)
    }
}
