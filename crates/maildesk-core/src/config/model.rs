//! Email channel configuration types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::WorkspaceId;

/// A workspace's email channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    /// Workspace this configuration belongs to.
    pub workspace_id: WorkspaceId,
    /// Address customers mail into. Generated once, immutable thereafter.
    pub forwarding_address: String,
    /// Display name on outbound email.
    pub from_name: String,
    /// Sender address on outbound email.
    pub from_email: String,
    /// HTML signature appended to outbound bodies, if set.
    pub signature: Option<String>,
    /// Whether agents may send replies over this channel.
    pub enabled: bool,
    /// When the channel was first configured.
    pub created_at: DateTime<Utc>,
    /// Last admin update.
    pub updated_at: DateTime<Utc>,
}

impl EmailConfig {
    /// Sender in `Name <address>` form for outbound headers.
    #[must_use]
    pub fn from_header(&self) -> String {
        if self.from_name.is_empty() {
            self.from_email.clone()
        } else {
            format!("{} <{}>", self.from_name, self.from_email)
        }
    }
}

/// Admin-editable settings applied by [`super::EmailConfigRepository::ensure`].
///
/// The forwarding address is deliberately absent: it is derived from the
/// workspace on first setup and cannot be changed afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    /// Display name on outbound email.
    pub from_name: String,
    /// Sender address on outbound email.
    pub from_email: String,
    /// HTML signature appended to outbound bodies.
    #[serde(default)]
    pub signature: Option<String>,
    /// Whether agents may send replies.
    pub enabled: bool,
}

/// Forwarding address assigned to a workspace at channel setup:
/// `inbox-{short code}@{mail domain}`.
#[must_use]
pub fn forwarding_address_for(workspace_id: &WorkspaceId, mail_domain: &str) -> String {
    format!("inbox-{}@{}", workspace_id.short_code(), mail_domain)
}
