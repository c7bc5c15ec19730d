//! Message storage.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::model::{
    Attachment, DeliveryStatus, EmailMetadata, Message, MessageId, NewMessage, SenderType,
};
use crate::Result;
use crate::conversation::ConversationId;
use crate::store::parse_timestamp;
use crate::tenant::WorkspaceId;

/// Repository for messages.
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL,
                workspace_id TEXT NOT NULL,
                sender_type TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                body_html TEXT,
                body_text TEXT,
                subject TEXT NOT NULL DEFAULT '',
                from_address TEXT NOT NULL DEFAULT '',
                to_json TEXT NOT NULL DEFAULT '[]',
                cc_json TEXT NOT NULL DEFAULT '[]',
                bcc_json TEXT NOT NULL DEFAULT '[]',
                email_message_id TEXT NOT NULL,
                in_reply_to TEXT,
                references_json TEXT NOT NULL DEFAULT '[]',
                attachments_json TEXT NOT NULL DEFAULT '[]',
                delivery_status TEXT,
                sent_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        // Index backing webhook reconciliation by Message-ID
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_email_message_id
            ON messages(email_message_id)
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, sent_at)
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Insert a message row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or metadata cannot
    /// be serialized.
    pub async fn insert(&self, message: &NewMessage) -> Result<Message> {
        let meta = &message.email_metadata;

        let result = sqlx::query(
            r"
            INSERT INTO messages
                (conversation_id, workspace_id, sender_type, sender_id,
                 body_html, body_text, subject, from_address,
                 to_json, cc_json, bcc_json,
                 email_message_id, in_reply_to, references_json, attachments_json,
                 delivery_status, sent_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(message.conversation_id.0)
        .bind(message.workspace_id.as_str())
        .bind(message.sender_type.as_str())
        .bind(&message.sender_id)
        .bind(message.body_html.as_deref())
        .bind(message.body_text.as_deref())
        .bind(&meta.subject)
        .bind(&meta.from)
        .bind(serde_json::to_string(&meta.to)?)
        .bind(serde_json::to_string(&meta.cc)?)
        .bind(serde_json::to_string(&meta.bcc)?)
        .bind(&meta.message_id)
        .bind(meta.in_reply_to.as_deref())
        .bind(serde_json::to_string(&meta.references)?)
        .bind(serde_json::to_string(&meta.attachments)?)
        .bind(message.delivery_status.map(|s| s.as_str()))
        .bind(message.sent_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id = MessageId::new(result.last_insert_rowid());
        self.get(id)
            .await?
            .ok_or_else(|| crate::Error::Config("Failed to retrieve message after insert".into()))
    }

    /// Get a message by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        let row = sqlx::query(&select_sql("WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| row_to_message(&r)))
    }

    /// Find the message carrying the given email Message-ID.
    ///
    /// Message-IDs are globally unique, so this lookup is not
    /// workspace-scoped; it backs webhook reconciliation and the
    /// duplicate-delivery guard.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email_message_id(&self, message_id: &str) -> Result<Option<Message>> {
        let row = sqlx::query(&select_sql("WHERE email_message_id = ?"))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| row_to_message(&r)))
    }

    /// List a conversation's messages in send order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>> {
        let rows = sqlx::query(&select_sql(
            "WHERE conversation_id = ? ORDER BY sent_at ASC, id ASC",
        ))
        .bind(conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    /// Set a message's delivery status.
    ///
    /// Returns `false` if no such message exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn set_delivery_status(
        &self,
        id: MessageId,
        status: DeliveryStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE messages SET delivery_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a message row.
    ///
    /// Only used to unwind a message written by an ingestion that then
    /// lost the duplicate-delivery race.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete(&self, id: MessageId) -> Result<()> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn select_sql(tail: &str) -> String {
    format!(
        "SELECT id, conversation_id, workspace_id, sender_type, sender_id,
                body_html, body_text, subject, from_address,
                to_json, cc_json, bcc_json,
                email_message_id, in_reply_to, references_json, attachments_json,
                delivery_status, sent_at, created_at
         FROM messages {tail}"
    )
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: MessageId::new(row.get("id")),
        conversation_id: ConversationId::new(row.get("conversation_id")),
        workspace_id: WorkspaceId::new(row.get::<String, _>("workspace_id")),
        sender_type: SenderType::parse(row.get("sender_type")),
        sender_id: row.get("sender_id"),
        body_html: row.get("body_html"),
        body_text: row.get("body_text"),
        email_metadata: EmailMetadata {
            subject: row.get("subject"),
            from: row.get("from_address"),
            to: json_list(&row.get::<String, _>("to_json")),
            cc: json_list(&row.get::<String, _>("cc_json")),
            bcc: json_list(&row.get::<String, _>("bcc_json")),
            message_id: row.get("email_message_id"),
            in_reply_to: row.get("in_reply_to"),
            references: json_list(&row.get::<String, _>("references_json")),
            attachments: json_attachments(&row.get::<String, _>("attachments_json")),
        },
        delivery_status: row
            .get::<Option<String>, _>("delivery_status")
            .map(|s| DeliveryStatus::parse(&s)),
        sent_at: parse_timestamp(&row.get::<String, _>("sent_at")),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}

fn json_list(value: &str) -> Vec<String> {
    serde_json::from_str(value).unwrap_or_default()
}

fn json_attachments(value: &str) -> Vec<Attachment> {
    serde_json::from_str(value).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::Database;

    fn inbound(conversation_id: ConversationId, mid: &str) -> NewMessage {
        NewMessage {
            conversation_id,
            workspace_id: WorkspaceId::new("w1"),
            sender_type: SenderType::Visitor,
            sender_id: "7".into(),
            body_html: Some("<p>my printer is on fire</p>".into()),
            body_text: Some("my printer is on fire".into()),
            email_metadata: EmailMetadata {
                subject: "Help".into(),
                from: "Customer <customer@example.com>".into(),
                to: vec!["inbox-abc@mail.acme.com".into()],
                cc: vec!["boss@example.com".into()],
                message_id: mid.into(),
                in_reply_to: Some("<root@example.com>".into()),
                references: vec!["<root@example.com>".into()],
                attachments: vec![Attachment {
                    file_name: "printer.jpg".into(),
                    content_type: Some("image/jpeg".into()),
                    size_bytes: Some(12345),
                    url: Some("https://files.acme.com/printer.jpg".into()),
                }],
                ..EmailMetadata::default()
            },
            delivery_status: None,
            sent_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrips_metadata() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.messages();

        let inserted = repo
            .insert(&inbound(ConversationId::new(1), "<m1@example.com>"))
            .await
            .unwrap();
        let fetched = repo.get(inserted.id).await.unwrap().unwrap();

        assert_eq!(fetched.email_metadata.message_id, "<m1@example.com>");
        assert_eq!(fetched.email_metadata.cc, vec!["boss@example.com"]);
        assert_eq!(fetched.email_metadata.references, vec!["<root@example.com>"]);
        assert_eq!(fetched.email_metadata.attachments.len(), 1);
        assert_eq!(fetched.email_metadata.attachments[0].file_name, "printer.jpg");
        assert_eq!(fetched.sender_type, SenderType::Visitor);
        assert!(fetched.delivery_status.is_none());
    }

    #[tokio::test]
    async fn test_find_by_email_message_id() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.messages();

        repo.insert(&inbound(ConversationId::new(1), "<m1@example.com>"))
            .await
            .unwrap();

        let found = repo
            .find_by_email_message_id("<m1@example.com>")
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = repo
            .find_by_email_message_id("<other@example.com>")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_set_delivery_status() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.messages();

        let mut outbound = inbound(ConversationId::new(1), "<out@mail.acme.com>");
        outbound.sender_type = SenderType::Agent;
        outbound.delivery_status = Some(DeliveryStatus::Pending);
        let message = repo.insert(&outbound).await.unwrap();
        assert_eq!(message.delivery_status, Some(DeliveryStatus::Pending));

        let updated = repo
            .set_delivery_status(message.id, DeliveryStatus::Sent)
            .await
            .unwrap();
        assert!(updated);
        let fetched = repo.get(message.id).await.unwrap().unwrap();
        assert_eq!(fetched.delivery_status, Some(DeliveryStatus::Sent));

        let missing = repo
            .set_delivery_status(MessageId::new(999), DeliveryStatus::Sent)
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_list_for_conversation_in_send_order() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.messages();
        let conversation = ConversationId::new(5);

        let mut first = inbound(conversation, "<m1@example.com>");
        first.sent_at = Utc::now() - chrono::Duration::minutes(10);
        repo.insert(&first).await.unwrap();
        repo.insert(&inbound(conversation, "<m2@example.com>"))
            .await
            .unwrap();
        repo.insert(&inbound(ConversationId::new(6), "<m3@example.com>"))
            .await
            .unwrap();

        let listed = repo.list_for_conversation(conversation).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].email_metadata.message_id, "<m1@example.com>");
        assert_eq!(listed[1].email_metadata.message_id, "<m2@example.com>");
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.messages();

        let message = repo
            .insert(&inbound(ConversationId::new(1), "<m1@example.com>"))
            .await
            .unwrap();
        repo.delete(message.id).await.unwrap();

        assert!(repo.get(message.id).await.unwrap().is_none());
    }
}
