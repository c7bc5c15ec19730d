//! Conversation storage.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::model::{Conversation, ConversationId, ConversationStatus};
use crate::Result;
use crate::store::parse_timestamp;
use crate::tenant::WorkspaceId;
use crate::visitor::VisitorId;

/// Repository for conversations.
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id TEXT NOT NULL,
                visitor_id INTEGER NOT NULL,
                channel TEXT NOT NULL DEFAULT 'email',
                subject TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'open',
                unread_by_agent INTEGER NOT NULL DEFAULT 0,
                unread_by_visitor INTEGER NOT NULL DEFAULT 0,
                last_message_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_conversations_workspace
            ON conversations(workspace_id, last_message_at)
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Create a new open email conversation for a visitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create(
        &self,
        workspace_id: &WorkspaceId,
        visitor_id: VisitorId,
        subject: &str,
    ) -> Result<Conversation> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            INSERT INTO conversations
                (workspace_id, visitor_id, channel, subject, status,
                 unread_by_agent, unread_by_visitor, last_message_at, created_at)
            VALUES (?, ?, 'email', ?, 'open', 1, 0, ?, ?)
            ",
        )
        .bind(workspace_id.as_str())
        .bind(visitor_id.0)
        .bind(subject)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = ConversationId::new(result.last_insert_rowid());
        self.get(id).await?.ok_or_else(|| {
            crate::Error::Config("Failed to retrieve conversation after insert".into())
        })
    }

    /// Get a conversation by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: ConversationId) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            r"
            SELECT id, workspace_id, visitor_id, channel, subject, status,
                   unread_by_agent, unread_by_visitor, last_message_at, created_at
            FROM conversations
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_conversation(&r)))
    }

    /// Reopen a closed conversation. Snoozed conversations are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn reopen(&self, id: ConversationId) -> Result<()> {
        sqlx::query(
            r"
            UPDATE conversations
            SET status = 'open'
            WHERE id = ? AND status = 'closed'
            ",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Administrative status change, as applied by the conversation app.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn set_status(&self, id: ConversationId, status: ConversationStatus) -> Result<()> {
        sqlx::query("UPDATE conversations SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record inbound activity on a conversation.
    ///
    /// Advances `last_message_at` and pins the agent-side unread badge:
    /// 2 when the conversation was already open before this email,
    /// 1 otherwise. The badge is set, not incremented.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn record_inbound(
        &self,
        id: ConversationId,
        previously_open: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let unread_by_agent = if previously_open { 2 } else { 1 };

        sqlx::query(
            r"
            UPDATE conversations
            SET last_message_at = ?, unread_by_agent = ?
            WHERE id = ?
            ",
        )
        .bind(at.to_rfc3339())
        .bind(unread_by_agent)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record an outbound reply: advances `last_message_at` and increments
    /// the visitor-side unread badge.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn record_outbound(&self, id: ConversationId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r"
            UPDATE conversations
            SET last_message_at = ?, unread_by_visitor = unread_by_visitor + 1
            WHERE id = ?
            ",
        )
        .bind(at.to_rfc3339())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a conversation row.
    ///
    /// Only used to unwind a conversation created moments earlier by an
    /// ingestion that then lost the duplicate-delivery race.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete(&self, id: ConversationId) -> Result<()> {
        sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Conversation {
    Conversation {
        id: ConversationId::new(row.get("id")),
        workspace_id: WorkspaceId::new(row.get::<String, _>("workspace_id")),
        visitor_id: VisitorId::new(row.get("visitor_id")),
        channel: row.get("channel"),
        subject: row.get("subject"),
        status: ConversationStatus::parse(row.get("status")),
        unread_by_agent: row.get::<i64, _>("unread_by_agent") as u32,
        unread_by_visitor: row.get::<i64, _>("unread_by_visitor") as u32,
        last_message_at: parse_timestamp(&row.get::<String, _>("last_message_at")),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::Database;

    async fn seed(db: &Database) -> Conversation {
        let visitor = db
            .visitors()
            .find_or_create(&WorkspaceId::new("w1"), "c@x.com", None)
            .await
            .unwrap();
        db.conversations()
            .create(&WorkspaceId::new("w1"), visitor.id, "Help me")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_starts_open_with_one_unread() {
        let db = Database::in_memory().await.unwrap();
        let conversation = seed(&db).await;

        assert_eq!(conversation.status, ConversationStatus::Open);
        assert_eq!(conversation.channel, "email");
        assert_eq!(conversation.unread_by_agent, 1);
        assert_eq!(conversation.unread_by_visitor, 0);
    }

    #[tokio::test]
    async fn test_reopen_only_touches_closed() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.conversations();
        let conversation = seed(&db).await;

        repo.set_status(conversation.id, ConversationStatus::Snoozed)
            .await
            .unwrap();
        repo.reopen(conversation.id).await.unwrap();
        let snoozed = repo.get(conversation.id).await.unwrap().unwrap();
        assert_eq!(snoozed.status, ConversationStatus::Snoozed);

        repo.set_status(conversation.id, ConversationStatus::Closed)
            .await
            .unwrap();
        repo.reopen(conversation.id).await.unwrap();
        let reopened = repo.get(conversation.id).await.unwrap().unwrap();
        assert_eq!(reopened.status, ConversationStatus::Open);
    }

    #[tokio::test]
    async fn test_record_inbound_pins_agent_badge() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.conversations();
        let conversation = seed(&db).await;

        repo.record_inbound(conversation.id, true, Utc::now()).await.unwrap();
        repo.record_inbound(conversation.id, true, Utc::now()).await.unwrap();
        let open = repo.get(conversation.id).await.unwrap().unwrap();
        assert_eq!(open.unread_by_agent, 2);

        repo.record_inbound(conversation.id, false, Utc::now()).await.unwrap();
        let fresh = repo.get(conversation.id).await.unwrap().unwrap();
        assert_eq!(fresh.unread_by_agent, 1);
    }

    #[tokio::test]
    async fn test_record_outbound_increments_visitor_badge() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.conversations();
        let conversation = seed(&db).await;

        repo.record_outbound(conversation.id, Utc::now()).await.unwrap();
        repo.record_outbound(conversation.id, Utc::now()).await.unwrap();

        let updated = repo.get(conversation.id).await.unwrap().unwrap();
        assert_eq!(updated.unread_by_visitor, 2);
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.conversations();
        let conversation = seed(&db).await;

        repo.delete(conversation.id).await.unwrap();
        assert!(repo.get(conversation.id).await.unwrap().is_none());
    }
}
