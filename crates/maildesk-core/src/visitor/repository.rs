//! Visitor storage and find-or-create resolution.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::model::{Visitor, VisitorId};
use crate::Result;
use crate::store::parse_timestamp;
use crate::tenant::WorkspaceId;

/// Repository for visitor contacts.
pub struct VisitorRepository {
    pool: SqlitePool,
}

impl VisitorRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS visitors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id TEXT NOT NULL,
                email TEXT NOT NULL,
                name TEXT,
                readable_id INTEGER,
                session_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(workspace_id, email)
            )
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Look up a visitor by workspace and email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find(&self, workspace_id: &WorkspaceId, email: &str) -> Result<Option<Visitor>> {
        let normalized_email = email.to_lowercase();

        let row = sqlx::query(
            r"
            SELECT id, workspace_id, email, name, readable_id, session_id, created_at
            FROM visitors
            WHERE workspace_id = ? AND email = ?
            ",
        )
        .bind(workspace_id.as_str())
        .bind(&normalized_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_visitor(&r)))
    }

    /// Resolve a sender address to a visitor, creating one on first contact.
    ///
    /// A visitor found without a readable ID gets one assigned before being
    /// returned; a brand-new visitor is inserted with a synthetic session ID
    /// and numbered immediately. Up to two writes for a new visitor, none
    /// for a returning one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_or_create(
        &self,
        workspace_id: &WorkspaceId,
        email: &str,
        name: Option<&str>,
    ) -> Result<Visitor> {
        let normalized_email = email.to_lowercase();

        if let Some(visitor) = self.find(workspace_id, &normalized_email).await? {
            if visitor.readable_id.is_some() {
                return Ok(visitor);
            }
            self.assign_readable_id(workspace_id, visitor.id).await?;
            return self.require(workspace_id, &normalized_email).await;
        }

        let now = Utc::now();
        let session_id = format!("email-{normalized_email}-{}", now.timestamp_millis());

        // A concurrent ingestion may have inserted the same address; the
        // unique constraint decides the winner and both callers re-read.
        sqlx::query(
            r"
            INSERT INTO visitors (workspace_id, email, name, session_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(workspace_id, email) DO NOTHING
            ",
        )
        .bind(workspace_id.as_str())
        .bind(&normalized_email)
        .bind(name)
        .bind(&session_id)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let visitor = self.require(workspace_id, &normalized_email).await?;
        if visitor.readable_id.is_none() {
            self.assign_readable_id(workspace_id, visitor.id).await?;
        }
        self.require(workspace_id, &normalized_email).await
    }

    /// Assign the next per-workspace readable number to a visitor.
    ///
    /// The `readable_id IS NULL` guard makes the assignment write-once:
    /// a concurrent or repeated call leaves an already-numbered visitor
    /// untouched.
    async fn assign_readable_id(&self, workspace_id: &WorkspaceId, id: VisitorId) -> Result<()> {
        sqlx::query(
            r"
            UPDATE visitors
            SET readable_id = (
                SELECT COALESCE(MAX(readable_id), 0) + 1
                FROM visitors
                WHERE workspace_id = ?
            )
            WHERE id = ? AND readable_id IS NULL
            ",
        )
        .bind(workspace_id.as_str())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn require(&self, workspace_id: &WorkspaceId, email: &str) -> Result<Visitor> {
        self.find(workspace_id, email).await?.ok_or_else(|| {
            crate::Error::Config("Failed to retrieve visitor after insert".into())
        })
    }
}

fn row_to_visitor(row: &sqlx::sqlite::SqliteRow) -> Visitor {
    Visitor {
        id: VisitorId::new(row.get("id")),
        workspace_id: WorkspaceId::new(row.get::<String, _>("workspace_id")),
        email: row.get("email"),
        name: row.get("name"),
        readable_id: row.get("readable_id"),
        session_id: row.get("session_id"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::Database;

    #[tokio::test]
    async fn test_first_contact_creates_numbered_visitor() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.visitors();
        let ws = WorkspaceId::new("w1");

        let visitor = repo
            .find_or_create(&ws, "Customer@Example.com", Some("A Customer"))
            .await
            .unwrap();

        assert_eq!(visitor.email, "customer@example.com");
        assert_eq!(visitor.name, Some("A Customer".to_string()));
        assert_eq!(visitor.readable_id, Some(1));
        assert!(visitor.session_id.starts_with("email-customer@example.com-"));
    }

    #[tokio::test]
    async fn test_returning_visitor_is_reused() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.visitors();
        let ws = WorkspaceId::new("w1");

        let first = repo
            .find_or_create(&ws, "customer@example.com", None)
            .await
            .unwrap();
        let second = repo
            .find_or_create(&ws, "customer@example.com", Some("Later Name"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.readable_id, Some(1));
        // The original (absent) name is not overwritten by later contacts.
        assert_eq!(second.name, None);
    }

    #[tokio::test]
    async fn test_readable_ids_count_up_per_workspace() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.visitors();
        let ws_a = WorkspaceId::new("wa");
        let ws_b = WorkspaceId::new("wb");

        let a1 = repo.find_or_create(&ws_a, "one@x.com", None).await.unwrap();
        let a2 = repo.find_or_create(&ws_a, "two@x.com", None).await.unwrap();
        let b1 = repo.find_or_create(&ws_b, "one@x.com", None).await.unwrap();

        assert_eq!(a1.readable_id, Some(1));
        assert_eq!(a2.readable_id, Some(2));
        assert_eq!(b1.readable_id, Some(1));
    }

    #[tokio::test]
    async fn test_legacy_visitor_without_number_gets_one_once() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.visitors();
        let ws = WorkspaceId::new("w1");

        repo.find_or_create(&ws, "numbered@x.com", None).await.unwrap();

        // Simulate a row imported before numbering existed.
        sqlx::query(
            "INSERT INTO visitors (workspace_id, email, session_id, created_at)
             VALUES ('w1', 'legacy@x.com', 'email-legacy@x.com-0', '2020-01-01T00:00:00Z')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let legacy = repo.find_or_create(&ws, "legacy@x.com", None).await.unwrap();
        assert_eq!(legacy.readable_id, Some(2));

        let again = repo.find_or_create(&ws, "legacy@x.com", None).await.unwrap();
        assert_eq!(again.readable_id, Some(2));
    }
}
