//! Email channel configuration storage.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::model::{EmailConfig, EmailSettings, forwarding_address_for};
use crate::Result;
use crate::store::parse_timestamp;
use crate::tenant::WorkspaceId;

/// Repository for per-workspace email channel configuration.
pub struct EmailConfigRepository {
    pool: SqlitePool,
}

impl EmailConfigRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS email_configs (
                workspace_id TEXT PRIMARY KEY,
                forwarding_address TEXT NOT NULL UNIQUE,
                from_name TEXT NOT NULL DEFAULT '',
                from_email TEXT NOT NULL DEFAULT '',
                signature TEXT,
                enabled INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Create or update a workspace's channel configuration.
    ///
    /// On first setup the forwarding address is generated from the
    /// workspace and the mail domain; later calls update the sending
    /// identity but leave the address untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn ensure(
        &self,
        workspace_id: &WorkspaceId,
        mail_domain: &str,
        settings: &EmailSettings,
    ) -> Result<EmailConfig> {
        let now = Utc::now().to_rfc3339();
        let forwarding_address = forwarding_address_for(workspace_id, mail_domain);

        sqlx::query(
            r"
            INSERT INTO email_configs
                (workspace_id, forwarding_address, from_name, from_email, signature, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(workspace_id) DO UPDATE SET
                from_name = excluded.from_name,
                from_email = excluded.from_email,
                signature = excluded.signature,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            ",
        )
        .bind(workspace_id.as_str())
        .bind(&forwarding_address)
        .bind(&settings.from_name)
        .bind(&settings.from_email)
        .bind(settings.signature.as_deref())
        .bind(settings.enabled)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(workspace_id).await?.ok_or_else(|| {
            crate::Error::Config("Failed to retrieve email config after upsert".into())
        })
    }

    /// Get a workspace's channel configuration.
    ///
    /// Returns `None` if the workspace has never configured the channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, workspace_id: &WorkspaceId) -> Result<Option<EmailConfig>> {
        let row = sqlx::query(
            r"
            SELECT workspace_id, forwarding_address, from_name, from_email,
                   signature, enabled, created_at, updated_at
            FROM email_configs
            WHERE workspace_id = ?
            ",
        )
        .bind(workspace_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_config(&r)))
    }
}

fn row_to_config(row: &sqlx::sqlite::SqliteRow) -> EmailConfig {
    EmailConfig {
        workspace_id: WorkspaceId::new(row.get::<String, _>("workspace_id")),
        forwarding_address: row.get("forwarding_address"),
        from_name: row.get("from_name"),
        from_email: row.get("from_email"),
        signature: row.get("signature"),
        enabled: row.get("enabled"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::Database;

    fn settings(enabled: bool) -> EmailSettings {
        EmailSettings {
            from_name: "Acme Support".into(),
            from_email: "support@mail.acme.com".into(),
            signature: Some("<p>— Acme</p>".into()),
            enabled,
        }
    }

    #[tokio::test]
    async fn test_ensure_generates_forwarding_address_once() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.configs();
        let ws = WorkspaceId::new("ws_8f3a2b9c4d5e");

        let first = repo
            .ensure(&ws, "mail.acme.com", &settings(true))
            .await
            .unwrap();
        assert_eq!(first.forwarding_address, "inbox-2b9c4d5e@mail.acme.com");
        assert!(first.enabled);

        // A second ensure, even against another domain, preserves the address.
        let updated = EmailSettings {
            from_name: "Acme Billing".into(),
            enabled: false,
            ..settings(true)
        };
        let second = repo
            .ensure(&ws, "mail.other.com", &updated)
            .await
            .unwrap();

        assert_eq!(second.forwarding_address, "inbox-2b9c4d5e@mail.acme.com");
        assert_eq!(second.from_name, "Acme Billing");
        assert!(!second.enabled);
    }

    #[tokio::test]
    async fn test_get_unconfigured_workspace_is_none() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.configs();

        let config = repo.get(&WorkspaceId::new("nowhere")).await.unwrap();
        assert!(config.is_none());
    }
}
