//! Inbound email ingestion pipelines.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::mint_email_message_id;
use super::notify::{NotificationEvent, NotificationKind};
use crate::conversation::{ConversationId, ConversationStatus};
use crate::jobs::JobKind;
use crate::message::{Attachment, EmailMetadata, Message, MessageId, NewMessage, SenderType};
use crate::normalize::{
    extract_email_address, normalize_subject, sender_display_name, strip_forward_prefix,
};
use crate::store::Database;
use crate::tenant::WorkspaceId;
use crate::thread::{MatchKeys, NewThreadRecord, resolve_conversation};
use crate::{Error, Result};

/// Shared-secret policy applied to the provider's inbound webhooks.
///
/// Enforcement fails closed: with enforcement on and no secret
/// configured, every request is rejected. Turning enforcement off is an
/// operational risk accepted explicitly at construction time.
#[derive(Debug, Clone)]
pub struct WebhookPolicy {
    secret: Option<String>,
    enforce: bool,
}

impl WebhookPolicy {
    /// Require every webhook call to present this secret.
    #[must_use]
    pub fn enforcing(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            enforce: true,
        }
    }

    /// Accept every webhook call without a secret check.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            secret: None,
            enforce: false,
        }
    }

    /// Check a presented secret against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] when enforcement is on and the
    /// presented secret is absent or wrong.
    pub fn authorize(&self, presented: Option<&str>) -> Result<()> {
        if !self.enforce {
            return Ok(());
        }
        match (&self.secret, presented) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            _ => Err(Error::Authorization("invalid webhook secret".into())),
        }
    }
}

/// Inbound webhook payload: one email as the provider parsed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEmail {
    /// Raw `From` header value.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    #[serde(default)]
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body, if the email carried one.
    #[serde(default)]
    pub text_body: Option<String>,
    /// HTML body, if the email carried one.
    #[serde(default)]
    pub html_body: Option<String>,
    /// The email's Message-ID.
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

/// Forwarded-mail webhook payload.
///
/// Sent when a customer-facing mailbox forwards an email into the
/// workspace's inbox address. The conversation is attributed to the
/// original sender, never the forwarder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedEmail {
    /// The mailbox that forwarded the email.
    pub forwarder_email: String,
    /// Raw `From` header of the original email.
    pub original_from: String,
    /// Recipient addresses of the forwarded copy.
    #[serde(default)]
    pub to: Vec<String>,
    /// CC addresses of the forwarded copy.
    #[serde(default)]
    pub cc: Vec<String>,
    /// Subject of the forwarded copy, usually `Fwd:`-prefixed.
    pub subject: String,
    /// Plain-text body, if present.
    #[serde(default)]
    pub text_body: Option<String>,
    /// HTML body, if present.
    #[serde(default)]
    pub html_body: Option<String>,
    /// Message-ID of the forwarded copy. Some forwarding setups drop
    /// it; one is synthesized then.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Attachment references.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// What an ingestion pipeline produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressReceipt {
    /// Conversation the email was filed under.
    pub conversation_id: ConversationId,
    /// The stored message.
    pub message_id: MessageId,
    /// True when this delivery replayed an already-ingested email; the
    /// receipt then describes the original ingestion and nothing was
    /// written.
    pub duplicate: bool,
}

/// The inbound ingestion pipelines.
///
/// Holds the webhook policy and the mail domain used when a Message-ID
/// has to be synthesized; everything else is passed per call.
#[derive(Debug, Clone)]
pub struct EmailIngress {
    policy: WebhookPolicy,
    mail_domain: String,
}

impl EmailIngress {
    /// Create the ingestion pipelines for one deployment.
    pub fn new(policy: WebhookPolicy, mail_domain: impl Into<String>) -> Self {
        Self {
            policy,
            mail_domain: mail_domain.into(),
        }
    }

    /// Ingest one inbound email.
    ///
    /// Authorizes the webhook, resolves the sender to a visitor, matches
    /// the email onto an existing conversation (reopening a closed one)
    /// or starts a new one, stores the message and its thread index row,
    /// and enqueues a new-message notification. Replayed deliveries of an
    /// already-known Message-ID return the original receipt and write
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] on a bad webhook secret (before
    /// any write) or a database error.
    pub async fn process_inbound_email(
        &self,
        db: &Database,
        presented_secret: Option<&str>,
        workspace_id: &WorkspaceId,
        email: &InboundEmail,
    ) -> Result<IngressReceipt> {
        self.policy.authorize(presented_secret)?;

        if let Some(original) = find_original(db, &email.message_id).await? {
            debug!("replayed inbound delivery of {}", email.message_id);
            return Ok(original);
        }

        let sender_email = extract_email_address(&email.from);
        let sender_name = sender_display_name(&email.from);
        let visitor = db
            .visitors()
            .find_or_create(workspace_id, &sender_email, sender_name)
            .await?;

        let keys = MatchKeys {
            in_reply_to: email.in_reply_to.as_deref(),
            references: &email.references,
            subject: &email.subject,
            sender_email: &sender_email,
        };
        let matched = resolve_conversation(db, workspace_id, &keys).await?;

        let (conversation, previously_open, created) = match matched {
            Some(conversation) => {
                let previously_open = conversation.is_open();
                if conversation.status == ConversationStatus::Closed {
                    db.conversations().reopen(conversation.id).await?;
                    debug!("reopened conversation {}", conversation.id);
                }
                (conversation, previously_open, false)
            }
            None => {
                let conversation = db
                    .conversations()
                    .create(workspace_id, visitor.id, &email.subject)
                    .await?;
                debug!("started conversation {} for {sender_email}", conversation.id);
                (conversation, false, true)
            }
        };

        let message = db
            .messages()
            .insert(&NewMessage {
                conversation_id: conversation.id,
                workspace_id: workspace_id.clone(),
                sender_type: SenderType::Visitor,
                sender_id: visitor.id.to_string(),
                body_html: email.html_body.clone(),
                body_text: email.text_body.clone(),
                email_metadata: EmailMetadata {
                    subject: email.subject.clone(),
                    from: email.from.clone(),
                    to: email.to.clone(),
                    cc: email.cc.clone(),
                    bcc: Vec::new(),
                    message_id: email.message_id.clone(),
                    in_reply_to: email.in_reply_to.clone(),
                    references: email.references.clone(),
                    attachments: email.attachments.clone(),
                },
                delivery_status: None,
                sent_at: Utc::now(),
            })
            .await?;

        let inserted = db
            .threads()
            .insert(&NewThreadRecord {
                workspace_id: workspace_id.clone(),
                conversation_id: conversation.id,
                message_id: email.message_id.clone(),
                in_reply_to: email.in_reply_to.clone(),
                references: email.references.clone(),
                subject: email.subject.clone(),
                normalized_subject: normalize_subject(&email.subject),
                sender_email: sender_email.clone(),
            })
            .await?;

        if !inserted {
            return unwind_lost_race(db, message, created.then_some(conversation.id)).await;
        }

        db.conversations()
            .record_inbound(conversation.id, previously_open, message.sent_at)
            .await?;

        enqueue_notification(db, NotificationKind::NewMessage, &message).await?;

        Ok(IngressReceipt {
            conversation_id: conversation.id,
            message_id: message.id,
            duplicate: false,
        })
    }

    /// Ingest one forwarded email.
    ///
    /// Never thread-matches: a forwarded email always starts a new
    /// conversation, attributed to the visitor derived from the original
    /// `From` header, not the forwarder. The conversation subject is the
    /// forwarded subject with one leading `fwd:`/`fw:` token removed. A
    /// new-conversation notification is enqueued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] on a bad webhook secret (before
    /// any write) or a database error.
    pub async fn process_forwarded_email(
        &self,
        db: &Database,
        presented_secret: Option<&str>,
        workspace_id: &WorkspaceId,
        email: &ForwardedEmail,
    ) -> Result<IngressReceipt> {
        self.policy.authorize(presented_secret)?;

        let email_message_id = email.message_id.clone().unwrap_or_else(|| {
            let minted = mint_email_message_id(workspace_id, &self.mail_domain);
            warn!(
                "forwarded email from {} carried no Message-ID, minted {minted}",
                email.forwarder_email
            );
            minted
        });

        if let Some(original) = find_original(db, &email_message_id).await? {
            debug!("replayed forwarded delivery of {email_message_id}");
            return Ok(original);
        }

        let sender_email = extract_email_address(&email.original_from);
        let sender_name = sender_display_name(&email.original_from);
        let visitor = db
            .visitors()
            .find_or_create(workspace_id, &sender_email, sender_name)
            .await?;

        let subject = strip_forward_prefix(&email.subject).to_string();
        let conversation = db
            .conversations()
            .create(workspace_id, visitor.id, &subject)
            .await?;
        debug!(
            "forwarded email from {} opened conversation {} for {sender_email}",
            email.forwarder_email, conversation.id
        );

        let message = db
            .messages()
            .insert(&NewMessage {
                conversation_id: conversation.id,
                workspace_id: workspace_id.clone(),
                sender_type: SenderType::Visitor,
                sender_id: visitor.id.to_string(),
                body_html: email.html_body.clone(),
                body_text: email.text_body.clone(),
                email_metadata: EmailMetadata {
                    subject: subject.clone(),
                    from: email.original_from.clone(),
                    to: email.to.clone(),
                    cc: email.cc.clone(),
                    bcc: Vec::new(),
                    message_id: email_message_id.clone(),
                    in_reply_to: None,
                    references: Vec::new(),
                    attachments: email.attachments.clone(),
                },
                delivery_status: None,
                sent_at: Utc::now(),
            })
            .await?;

        let inserted = db
            .threads()
            .insert(&NewThreadRecord {
                workspace_id: workspace_id.clone(),
                conversation_id: conversation.id,
                message_id: email_message_id,
                in_reply_to: None,
                references: Vec::new(),
                subject: subject.clone(),
                normalized_subject: normalize_subject(&subject),
                sender_email,
            })
            .await?;

        if !inserted {
            return unwind_lost_race(db, message, Some(conversation.id)).await;
        }

        db.conversations()
            .record_inbound(conversation.id, false, message.sent_at)
            .await?;

        enqueue_notification(db, NotificationKind::NewConversation, &message).await?;

        Ok(IngressReceipt {
            conversation_id: conversation.id,
            message_id: message.id,
            duplicate: false,
        })
    }
}

/// Fast-path duplicate check: an email whose Message-ID is already
/// stored was ingested before.
async fn find_original(db: &Database, email_message_id: &str) -> Result<Option<IngressReceipt>> {
    let existing = db.messages().find_by_email_message_id(email_message_id).await?;
    Ok(existing.map(|message| IngressReceipt {
        conversation_id: message.conversation_id,
        message_id: message.id,
        duplicate: true,
    }))
}

/// A concurrent delivery of the same Message-ID won the thread-row
/// insert. Delete what this pipeline just wrote (the message, and the
/// conversation when this email created it) and answer with the
/// winner's receipt.
async fn unwind_lost_race(
    db: &Database,
    message: Message,
    created_conversation: Option<ConversationId>,
) -> Result<IngressReceipt> {
    warn!(
        "lost duplicate-delivery race for {}, unwinding message {}",
        message.email_metadata.message_id, message.id
    );

    db.messages().delete(message.id).await?;
    if let Some(conversation_id) = created_conversation {
        db.conversations().delete(conversation_id).await?;
    }

    find_original(db, &message.email_metadata.message_id)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "winning ingestion of {} left no message",
                message.email_metadata.message_id
            ))
        })
}

async fn enqueue_notification(
    db: &Database,
    kind: NotificationKind,
    message: &Message,
) -> Result<()> {
    let event = NotificationEvent::for_message(kind, message);
    db.jobs().enqueue(JobKind::Notify, &event).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ingress() -> EmailIngress {
        EmailIngress::new(WebhookPolicy::enforcing("s3cret"), "mail.acme.com")
    }

    fn inbound(mid: &str, subject: &str, from: &str) -> InboundEmail {
        InboundEmail {
            from: from.into(),
            to: vec!["inbox-w1@mail.acme.com".into()],
            cc: Vec::new(),
            subject: subject.into(),
            text_body: Some("help".into()),
            html_body: None,
            message_id: mid.into(),
            in_reply_to: None,
            references: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_bad_secret_fails_closed_with_no_writes() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");
        let email = inbound("<m1@example.com>", "Help me", "a@x.com");

        let err = ingress()
            .process_inbound_email(&db, Some("wrong"), &ws, &email)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));

        let missing = ingress()
            .process_inbound_email(&db, None, &ws, &email)
            .await
            .unwrap_err();
        assert!(matches!(missing, Error::Authorization(_)));

        assert!(db.visitors().find(&ws, "a@x.com").await.unwrap().is_none());
        assert!(
            db.threads()
                .find_by_message_id("<m1@example.com>")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_disabled_enforcement_accepts_anything() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");
        let open = EmailIngress::new(WebhookPolicy::disabled(), "mail.acme.com");

        let receipt = open
            .process_inbound_email(&db, None, &ws, &inbound("<m1@x>", "Hi", "a@x.com"))
            .await
            .unwrap();
        assert!(!receipt.duplicate);
    }

    #[tokio::test]
    async fn test_unmatched_email_creates_conversation_and_thread_row() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");

        let receipt = ingress()
            .process_inbound_email(
                &db,
                Some("s3cret"),
                &ws,
                &inbound("<m1@example.com>", "Help me", "Jane <a@x.com>"),
            )
            .await
            .unwrap();

        let conversation = db.conversations().get(receipt.conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.subject, "Help me");
        assert_eq!(conversation.status, ConversationStatus::Open);
        assert_eq!(conversation.unread_by_agent, 1);

        let thread = db
            .threads()
            .find_by_message_id("<m1@example.com>")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(thread.conversation_id, receipt.conversation_id);

        let message = db.messages().get(receipt.message_id).await.unwrap().unwrap();
        assert_eq!(message.email_metadata.message_id, "<m1@example.com>");
        assert_eq!(message.sender_type, SenderType::Visitor);

        let visitor = db.visitors().find(&ws, "a@x.com").await.unwrap().unwrap();
        assert_eq!(visitor.name, Some("Jane".to_string()));
        assert_eq!(message.sender_id, visitor.id.to_string());
    }

    #[tokio::test]
    async fn test_reply_lands_on_the_same_conversation() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");
        let pipeline = ingress();

        let first = pipeline
            .process_inbound_email(
                &db,
                Some("s3cret"),
                &ws,
                &inbound("<m1@example.com>", "Help me", "a@x.com"),
            )
            .await
            .unwrap();

        let mut reply = inbound("<m2@example.com>", "Re: Help me", "a@x.com");
        reply.in_reply_to = Some("<m1@example.com>".into());
        let second = pipeline
            .process_inbound_email(&db, Some("s3cret"), &ws, &reply)
            .await
            .unwrap();

        assert_eq!(second.conversation_id, first.conversation_id);
        assert_ne!(second.message_id, first.message_id);

        // Already-open conversation: the badge is pinned to 2, not
        // incremented per message.
        let conversation = db.conversations().get(first.conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.unread_by_agent, 2);
    }

    #[tokio::test]
    async fn test_matched_closed_conversation_is_reopened() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");
        let pipeline = ingress();

        let first = pipeline
            .process_inbound_email(
                &db,
                Some("s3cret"),
                &ws,
                &inbound("<m1@example.com>", "Help me", "a@x.com"),
            )
            .await
            .unwrap();
        db.conversations()
            .set_status(first.conversation_id, ConversationStatus::Closed)
            .await
            .unwrap();

        let mut reply = inbound("<m2@example.com>", "Re: Help me", "a@x.com");
        reply.in_reply_to = Some("<m1@example.com>".into());
        pipeline
            .process_inbound_email(&db, Some("s3cret"), &ws, &reply)
            .await
            .unwrap();

        let conversation = db.conversations().get(first.conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.status, ConversationStatus::Open);
        // Reopened conversations get badge 1, same as brand-new ones.
        assert_eq!(conversation.unread_by_agent, 1);
    }

    #[tokio::test]
    async fn test_replayed_delivery_returns_original_receipt() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");
        let pipeline = ingress();
        let email = inbound("<m1@example.com>", "Help me", "a@x.com");

        let first = pipeline
            .process_inbound_email(&db, Some("s3cret"), &ws, &email)
            .await
            .unwrap();
        let replay = pipeline
            .process_inbound_email(&db, Some("s3cret"), &ws, &email)
            .await
            .unwrap();

        assert!(replay.duplicate);
        assert_eq!(replay.conversation_id, first.conversation_id);
        assert_eq!(replay.message_id, first.message_id);

        // Exactly one message and one notify job exist.
        let messages = db
            .messages()
            .list_for_conversation(first.conversation_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        let jobs = db.jobs().due(Utc::now(), 10).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_notification_job_carries_the_event() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");

        let receipt = ingress()
            .process_inbound_email(
                &db,
                Some("s3cret"),
                &ws,
                &inbound("<m1@example.com>", "Help me", "a@x.com"),
            )
            .await
            .unwrap();

        let jobs = db.jobs().due(Utc::now(), 10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::Notify);

        let event: NotificationEvent = serde_json::from_str(&jobs[0].payload).unwrap();
        assert_eq!(event.kind, NotificationKind::NewMessage);
        assert_eq!(event.conversation_id, receipt.conversation_id);
        assert_eq!(event.message_id, receipt.message_id);
        assert_eq!(event.message_content, "help");
        assert_eq!(event.channel, "email");
    }

    #[tokio::test]
    async fn test_forwarded_email_attributes_the_original_sender() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");

        let receipt = ingress()
            .process_forwarded_email(
                &db,
                Some("s3cret"),
                &ws,
                &ForwardedEmail {
                    forwarder_email: "support@biz.com".into(),
                    original_from: "Customer <customer@biz.com>".into(),
                    to: vec!["inbox-w1@mail.acme.com".into()],
                    cc: Vec::new(),
                    subject: "Fwd: Broken invoice".into(),
                    text_body: Some("see below".into()),
                    html_body: None,
                    message_id: Some("<fwd1@biz.com>".into()),
                    attachments: Vec::new(),
                },
            )
            .await
            .unwrap();

        // The visitor is keyed on the original sender, not the forwarder.
        assert!(db.visitors().find(&ws, "support@biz.com").await.unwrap().is_none());
        let visitor = db.visitors().find(&ws, "customer@biz.com").await.unwrap().unwrap();

        let conversation = db.conversations().get(receipt.conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.subject, "Broken invoice");
        assert_eq!(conversation.visitor_id, visitor.id);

        let jobs = db.jobs().due(Utc::now(), 10).await.unwrap();
        let event: NotificationEvent = serde_json::from_str(&jobs[0].payload).unwrap();
        assert_eq!(event.kind, NotificationKind::NewConversation);
    }

    #[tokio::test]
    async fn test_forwarded_email_never_thread_matches() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");
        let pipeline = ingress();

        let first = pipeline
            .process_inbound_email(
                &db,
                Some("s3cret"),
                &ws,
                &inbound("<m1@example.com>", "Broken invoice", "customer@biz.com"),
            )
            .await
            .unwrap();

        // Same sender, same normalized subject: a direct email would
        // match by subject fallback, a forwarded one must not.
        let forwarded = pipeline
            .process_forwarded_email(
                &db,
                Some("s3cret"),
                &ws,
                &ForwardedEmail {
                    forwarder_email: "support@biz.com".into(),
                    original_from: "customer@biz.com".into(),
                    to: Vec::new(),
                    cc: Vec::new(),
                    subject: "Fwd: Broken invoice".into(),
                    text_body: None,
                    html_body: None,
                    message_id: Some("<fwd1@biz.com>".into()),
                    attachments: Vec::new(),
                },
            )
            .await
            .unwrap();

        assert_ne!(forwarded.conversation_id, first.conversation_id);
    }

    #[tokio::test]
    async fn test_forwarded_email_without_message_id_gets_one_minted() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");

        let receipt = ingress()
            .process_forwarded_email(
                &db,
                Some("s3cret"),
                &ws,
                &ForwardedEmail {
                    forwarder_email: "support@biz.com".into(),
                    original_from: "customer@biz.com".into(),
                    to: Vec::new(),
                    cc: Vec::new(),
                    subject: "FW: no id".into(),
                    text_body: None,
                    html_body: None,
                    message_id: None,
                    attachments: Vec::new(),
                },
            )
            .await
            .unwrap();

        let message = db.messages().get(receipt.message_id).await.unwrap().unwrap();
        assert!(message.email_metadata.message_id.starts_with('<'));
        assert!(
            message
                .email_metadata
                .message_id
                .ends_with(".w1@mail.acme.com>")
        );

        // The minted ID participates in the thread index like any other.
        let thread = db
            .threads()
            .find_by_message_id(&message.email_metadata.message_id)
            .await
            .unwrap();
        assert!(thread.is_some());
    }

    #[tokio::test]
    async fn test_lost_thread_insert_race_is_unwound() {
        let db = Database::in_memory().await.unwrap();
        let ws = WorkspaceId::new("w1");
        let pipeline = ingress();

        let winner = pipeline
            .process_inbound_email(
                &db,
                Some("s3cret"),
                &ws,
                &inbound("<m1@example.com>", "Help me", "a@x.com"),
            )
            .await
            .unwrap();

        // Simulate the loser's interleaving: its fast-path check ran
        // before the winner committed, so it wrote a message and then
        // lost the thread insert.
        let message = db
            .messages()
            .insert(&NewMessage {
                conversation_id: ConversationId::new(999),
                workspace_id: ws.clone(),
                sender_type: SenderType::Visitor,
                sender_id: "1".into(),
                body_html: None,
                body_text: Some("help".into()),
                email_metadata: EmailMetadata {
                    message_id: "<m1@example.com>".into(),
                    ..EmailMetadata::default()
                },
                delivery_status: None,
                sent_at: Utc::now(),
            })
            .await
            .unwrap();

        let receipt = unwind_lost_race(&db, message.clone(), None).await.unwrap();
        assert!(receipt.duplicate);
        assert_eq!(receipt.conversation_id, winner.conversation_id);
        assert!(db.messages().get(message.id).await.unwrap().is_none());
    }
}
