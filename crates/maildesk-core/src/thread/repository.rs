//! Thread index storage.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::model::{NewThreadRecord, ThreadRecord};
use crate::Result;
use crate::conversation::ConversationId;
use crate::store::parse_timestamp;
use crate::tenant::WorkspaceId;

/// Repository for the email thread index.
pub struct ThreadRepository {
    pool: SqlitePool,
}

impl ThreadRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS email_threads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id TEXT NOT NULL,
                conversation_id INTEGER NOT NULL,
                message_id TEXT NOT NULL UNIQUE,
                in_reply_to TEXT,
                references_json TEXT NOT NULL DEFAULT '[]',
                subject TEXT NOT NULL DEFAULT '',
                normalized_subject TEXT NOT NULL DEFAULT '',
                sender_email TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        // Index for subject-fallback matching
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_email_threads_subject
            ON email_threads(workspace_id, normalized_subject, sender_email)
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Insert a thread index row.
    ///
    /// Returns `false` when a row with the same Message-ID already exists;
    /// the existing row is left untouched. This is the idempotency guard
    /// against replayed webhook deliveries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the references
    /// list cannot be serialized.
    pub async fn insert(&self, record: &NewThreadRecord) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO email_threads
                (workspace_id, conversation_id, message_id, in_reply_to,
                 references_json, subject, normalized_subject, sender_email, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(message_id) DO NOTHING
            ",
        )
        .bind(record.workspace_id.as_str())
        .bind(record.conversation_id.0)
        .bind(&record.message_id)
        .bind(record.in_reply_to.as_deref())
        .bind(serde_json::to_string(&record.references)?)
        .bind(&record.subject)
        .bind(&record.normalized_subject)
        .bind(&record.sender_email)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Find the thread row carrying the given Message-ID, regardless of
    /// workspace. Backs webhook reconciliation, where the payload carries
    /// no tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_message_id(&self, message_id: &str) -> Result<Option<ThreadRecord>> {
        let row = sqlx::query(&select_sql("WHERE message_id = ?"))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| row_to_record(&r)))
    }

    /// Find a thread row by Message-ID within one workspace.
    ///
    /// Matching is tenant-scoped: a Message-ID known to another workspace
    /// never resolves here.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_in_workspace(
        &self,
        workspace_id: &WorkspaceId,
        message_id: &str,
    ) -> Result<Option<ThreadRecord>> {
        let row = sqlx::query(&select_sql("WHERE workspace_id = ? AND message_id = ?"))
            .bind(workspace_id.as_str())
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| row_to_record(&r)))
    }

    /// Subject-fallback lookup: the most recent thread row written for
    /// this `(workspace, normalized subject, sender)` combination.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_subject(
        &self,
        workspace_id: &WorkspaceId,
        normalized_subject: &str,
        sender_email: &str,
    ) -> Result<Option<ThreadRecord>> {
        let row = sqlx::query(&select_sql(
            "WHERE workspace_id = ? AND normalized_subject = ? AND sender_email = ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        ))
        .bind(workspace_id.as_str())
        .bind(normalized_subject)
        .bind(sender_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_record(&r)))
    }
}

fn select_sql(tail: &str) -> String {
    format!(
        "SELECT id, workspace_id, conversation_id, message_id, in_reply_to,
                references_json, subject, normalized_subject, sender_email, created_at
         FROM email_threads {tail}"
    )
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> ThreadRecord {
    ThreadRecord {
        id: row.get("id"),
        workspace_id: WorkspaceId::new(row.get::<String, _>("workspace_id")),
        conversation_id: ConversationId::new(row.get("conversation_id")),
        message_id: row.get("message_id"),
        in_reply_to: row.get("in_reply_to"),
        references: serde_json::from_str(&row.get::<String, _>("references_json"))
            .unwrap_or_default(),
        subject: row.get("subject"),
        normalized_subject: row.get("normalized_subject"),
        sender_email: row.get("sender_email"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}
