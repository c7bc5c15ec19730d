//! Ordered-fallback conversation matching.

use tracing::debug;

use crate::Result;
use crate::conversation::Conversation;
use crate::normalize::normalize_subject;
use crate::store::Database;
use crate::tenant::WorkspaceId;

/// The inbound headers a match decision is based on. Every field may be
/// absent or empty; matching degrades through the fallbacks accordingly.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchKeys<'a> {
    /// `In-Reply-To` header of the inbound email.
    pub in_reply_to: Option<&'a str>,
    /// `References` chain of the inbound email, in header order.
    pub references: &'a [String],
    /// Raw subject of the inbound email.
    pub subject: &'a str,
    /// Bare sender address, lower-cased.
    pub sender_email: &'a str,
}

/// Resolve an inbound email to an existing conversation.
///
/// Fallbacks are tried strictly in order, first hit wins:
///
/// 1. Thread row whose Message-ID equals `in_reply_to`.
/// 2. `References` scanned in the order the sender put them on the wire
///    (root first) — the earliest listed known ancestor wins, not the
///    nearest one.
/// 3. Newest thread row for `(workspace, normalized subject, sender)`.
///
/// Returns `None` when nothing matches; the caller starts a new
/// conversation. All lookups are scoped to `workspace_id`.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub async fn resolve_conversation(
    db: &Database,
    workspace_id: &WorkspaceId,
    keys: &MatchKeys<'_>,
) -> Result<Option<Conversation>> {
    let threads = db.threads();
    let conversations = db.conversations();

    if let Some(in_reply_to) = keys.in_reply_to
        && let Some(record) = threads.find_in_workspace(workspace_id, in_reply_to).await?
        && let Some(conversation) = conversations.get(record.conversation_id).await?
    {
        debug!(
            "matched conversation {} by In-Reply-To {in_reply_to}",
            conversation.id
        );
        return Ok(Some(conversation));
    }

    for reference in keys.references {
        if let Some(record) = threads.find_in_workspace(workspace_id, reference).await?
            && let Some(conversation) = conversations.get(record.conversation_id).await?
        {
            debug!(
                "matched conversation {} by reference {reference}",
                conversation.id
            );
            return Ok(Some(conversation));
        }
    }

    let normalized = normalize_subject(keys.subject);
    if let Some(record) = threads
        .find_by_subject(workspace_id, &normalized, keys.sender_email)
        .await?
        && let Some(conversation) = conversations.get(record.conversation_id).await?
    {
        debug!(
            "matched conversation {} by subject {normalized:?}",
            conversation.id
        );
        return Ok(Some(conversation));
    }

    Ok(None)
}
