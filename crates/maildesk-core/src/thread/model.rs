//! Thread index model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;
use crate::tenant::WorkspaceId;

/// One index row per email, written at ingestion or composition time and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRecord {
    /// Unique identifier.
    pub id: i64,
    /// Workspace the email belongs to.
    pub workspace_id: WorkspaceId,
    /// Conversation the email was filed under.
    pub conversation_id: ConversationId,
    /// The email's Message-ID. Globally unique.
    pub message_id: String,
    /// `In-Reply-To` header, if present.
    pub in_reply_to: Option<String>,
    /// `References` chain in header order.
    pub references: Vec<String>,
    /// Subject as received.
    pub subject: String,
    /// Canonical subject used for fallback matching.
    pub normalized_subject: String,
    /// Bare sender address, lower-cased.
    pub sender_email: String,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a thread index row.
#[derive(Debug, Clone)]
pub struct NewThreadRecord {
    /// Workspace the email belongs to.
    pub workspace_id: WorkspaceId,
    /// Conversation the email was filed under.
    pub conversation_id: ConversationId,
    /// The email's Message-ID.
    pub message_id: String,
    /// `In-Reply-To` header, if present.
    pub in_reply_to: Option<String>,
    /// `References` chain in header order.
    pub references: Vec<String>,
    /// Subject as received.
    pub subject: String,
    /// Canonical subject used for fallback matching.
    pub normalized_subject: String,
    /// Bare sender address, lower-cased.
    pub sender_email: String,
}
