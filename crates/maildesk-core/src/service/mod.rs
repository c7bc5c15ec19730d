//! Pipeline services over the repositories.
//!
//! Four pipelines make up the engine: inbound ingestion (direct and
//! forwarded), outbound reply composition, delivery dispatch and
//! reconciliation, and the background worker that drains the durable
//! job queue. Services hold no state beyond their configuration; every
//! write goes through the repositories as a single atomic statement.

use chrono::Utc;
use rand::Rng;

use crate::tenant::WorkspaceId;

pub mod delivery;
pub mod ingress;
pub mod notify;
pub mod reply;
pub mod worker;

pub use delivery::{
    ReconcileOutcome, update_delivery_status, update_delivery_status_by_external_id,
};
pub use ingress::{
    EmailIngress, ForwardedEmail, InboundEmail, IngressReceipt, WebhookPolicy,
};
pub use notify::{NotificationEvent, NotificationKind, Notifier};
pub use reply::{Authorizer, ReplyComposer, ReplyReceipt, ReplyRequest};
pub use worker::{WorkerOptions, drain_due_jobs, run_worker};

/// Permission names checked against the platform's permission engine.
pub mod permissions {
    /// Send replies on a workspace's conversations.
    pub const CONVERSATIONS_REPLY: &str = "conversations.reply";
    /// Administer a workspace's channel integrations.
    pub const SETTINGS_INTEGRATIONS: &str = "settings.integrations";
}

/// Mint a globally unique Message-ID for an email originated here:
/// `<{epoch millis}.{random base36 token}.{workspace}@{mail domain}>`.
pub(crate) fn mint_email_message_id(workspace_id: &WorkspaceId, mail_domain: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let token = base36(rand::thread_rng().r#gen::<u64>());
    format!("<{millis}.{token}.{workspace_id}@{mail_domain}>")
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
