//! Visitor model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::WorkspaceId;

/// Unique identifier for a visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisitorId(pub i64);

impl VisitorId {
    /// Create a new visitor ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for VisitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A contact identified by email within one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    /// Unique identifier.
    pub id: VisitorId,
    /// Workspace this visitor belongs to.
    pub workspace_id: WorkspaceId,
    /// Email address (normalized to lowercase).
    pub email: String,
    /// Display name captured from the first `From` header, if present.
    pub name: Option<String>,
    /// Per-workspace friendly number agents see. Assigned exactly once.
    pub readable_id: Option<i64>,
    /// Synthetic session identifier tying the contact to its channel.
    pub session_id: String,
    /// First time this address wrote in.
    pub created_at: DateTime<Utc>,
}
