//! Delivery dispatch and status reconciliation.

use maildesk_transport::{DeliveryOutcome, Mailer, OutboundEmail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::jobs::SendEmailJob;
use crate::message::{DeliveryStatus, Message, MessageId};
use crate::store::Database;
use crate::{Error, Result};

/// Result of reconciling a provider webhook onto a message.
///
/// A value, never an error: webhook payloads may be stale or replayed,
/// so an update that cannot be applied is reported and dropped rather
/// than bounced back to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum ReconcileOutcome {
    /// The status was applied.
    Updated {
        /// The patched message.
        message_id: MessageId,
        /// The status written.
        status: DeliveryStatus,
    },
    /// No message carries the external email ID; nothing was written.
    NotFound {
        /// Why the update was dropped.
        reason: String,
    },
    /// The thread index and the message disagree about the conversation;
    /// nothing was written.
    ConversationMismatch {
        /// The message the webhook pointed at.
        message_id: MessageId,
    },
}

impl ReconcileOutcome {
    /// Whether a status was written.
    #[must_use]
    pub const fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Patch a message's delivery status by internal ID.
///
/// Used by the dispatcher, which knows exactly which message it sent.
///
/// # Errors
///
/// Returns [`Error::NotFound`] when no such message exists, or a
/// database error.
pub async fn update_delivery_status(
    db: &Database,
    message_id: MessageId,
    status: DeliveryStatus,
) -> Result<()> {
    let updated = db.messages().set_delivery_status(message_id, status).await?;
    if updated {
        debug!("message {message_id} delivery status set to {}", status.as_str());
        Ok(())
    } else {
        Err(Error::NotFound(format!("message {message_id}")))
    }
}

/// Apply a provider delivery webhook onto the message it names.
///
/// The external email ID is the outbound email's Message-ID, resolved
/// through the index on the messages table; the thread index row for
/// the same ID serves as a consistency cross-check. A payload naming an
/// unknown ID, an inbound email, or a message whose conversation
/// disagrees with the thread index is dropped with a reported reason.
///
/// # Errors
///
/// Returns an error only on database failure; every reconciliation
/// decision is a [`ReconcileOutcome`].
pub async fn update_delivery_status_by_external_id(
    db: &Database,
    external_email_id: &str,
    outcome: DeliveryOutcome,
) -> Result<ReconcileOutcome> {
    let thread = db.threads().find_by_message_id(external_email_id).await?;
    let Some(message) = db.messages().find_by_email_message_id(external_email_id).await? else {
        return Ok(ReconcileOutcome::NotFound {
            reason: format!("no message carries Message-ID {external_email_id}"),
        });
    };

    if message.delivery_status.is_none() {
        return Ok(ReconcileOutcome::NotFound {
            reason: format!("{external_email_id} is an inbound email"),
        });
    }

    if let Some(thread) = thread
        && thread.conversation_id != message.conversation_id
    {
        warn!(
            "delivery webhook for {external_email_id}: thread row points at conversation {} \
             but message {} sits on {}",
            thread.conversation_id, message.id, message.conversation_id
        );
        return Ok(ReconcileOutcome::ConversationMismatch {
            message_id: message.id,
        });
    }

    let status = match outcome {
        DeliveryOutcome::Delivered => DeliveryStatus::Delivered,
        DeliveryOutcome::Bounced => DeliveryStatus::Bounced,
    };

    let updated = db.messages().set_delivery_status(message.id, status).await?;
    if updated {
        debug!("reconciled {external_email_id} to {}", status.as_str());
        Ok(ReconcileOutcome::Updated {
            message_id: message.id,
            status,
        })
    } else {
        Ok(ReconcileOutcome::NotFound {
            reason: format!("message {} vanished during reconciliation", message.id),
        })
    }
}

/// How a send attempt left the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SendDisposition {
    /// Provider accepted; `delivery_status = sent`.
    Sent,
    /// Permanent failure; `delivery_status = failed`.
    Failed(String),
    /// Transient failure; status untouched, worth retrying.
    Retry(String),
    /// The message is no longer pending (replayed job); nothing to do.
    Skipped,
}

/// Execute one send job: build the provider request and hand it over.
///
/// Transport failures never escape as errors. A permanent failure
/// (provider 4xx, missing credentials) marks the message `failed`; a
/// transient one (timeout, connect failure, 5xx) is returned for the
/// worker to reschedule.
pub(crate) async fn dispatch_send(
    db: &Database,
    mailer: &impl Mailer,
    job: &SendEmailJob,
) -> Result<SendDisposition> {
    let message = db
        .messages()
        .get(job.message_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("message {}", job.message_id)))?;

    if message.delivery_status != Some(DeliveryStatus::Pending) {
        debug!("message {} is not pending, skipping send", message.id);
        return Ok(SendDisposition::Skipped);
    }

    let Some(config) = db.configs().get(&message.workspace_id).await? else {
        // Channel deconfigured between compose and dispatch.
        update_delivery_status(db, message.id, DeliveryStatus::Failed).await?;
        return Ok(SendDisposition::Failed(
            "email channel is no longer configured".into(),
        ));
    };

    let email = build_outbound(&message, config.signature.as_deref());

    match mailer.send(&email).await {
        Ok(receipt) => {
            update_delivery_status(db, message.id, DeliveryStatus::Sent).await?;
            debug!(
                "sent {} (provider id {:?})",
                email.message_id, receipt.provider_id
            );
            Ok(SendDisposition::Sent)
        }
        Err(err) if err.is_permanent() => {
            warn!("permanent send failure for {}: {err}", email.message_id);
            update_delivery_status(db, message.id, DeliveryStatus::Failed).await?;
            Ok(SendDisposition::Failed(err.to_string()))
        }
        Err(err) => {
            warn!("transient send failure for {}: {err}", email.message_id);
            Ok(SendDisposition::Retry(err.to_string()))
        }
    }
}

/// Assemble the provider payload from a stored message: threading
/// headers verbatim, References joined by spaces, signature appended to
/// the HTML body when configured.
fn build_outbound(message: &Message, signature: Option<&str>) -> OutboundEmail {
    let meta = &message.email_metadata;

    let mut html_body = message.body_html.clone().unwrap_or_default();
    if let Some(signature) = signature {
        html_body.push_str("<br><br>");
        html_body.push_str(signature);
    }

    OutboundEmail {
        from: meta.from.clone(),
        to: meta.to.clone(),
        cc: meta.cc.clone(),
        bcc: meta.bcc.clone(),
        subject: meta.subject.clone(),
        html_body,
        text_body: message.body_text.clone(),
        message_id: meta.message_id.clone(),
        in_reply_to: meta.in_reply_to.clone(),
        references: if meta.references.is_empty() {
            None
        } else {
            Some(meta.references.join(" "))
        },
        attachments: meta
            .attachments
            .iter()
            .map(|a| maildesk_transport::EmailAttachment {
                file_name: a.file_name.clone(),
                content_type: a.content_type.clone(),
                url: a.url.clone(),
            })
            .collect(),
    }
}
