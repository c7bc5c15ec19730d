//! Database handle and schema initialization.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;
use crate::config::EmailConfigRepository;
use crate::conversation::ConversationRepository;
use crate::jobs::JobRepository;
use crate::message::MessageRepository;
use crate::thread::ThreadRepository;
use crate::visitor::VisitorRepository;

/// Handle to the engine's SQLite database.
///
/// One pool shared by all repositories; each accessor returns a
/// lightweight repository over the same pool. Schema is created on open,
/// so a fresh database file is immediately usable.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema
    /// creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Create an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema
    /// creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<()> {
        EmailConfigRepository::initialize(&self.pool).await?;
        VisitorRepository::initialize(&self.pool).await?;
        ConversationRepository::initialize(&self.pool).await?;
        MessageRepository::initialize(&self.pool).await?;
        ThreadRepository::initialize(&self.pool).await?;
        JobRepository::initialize(&self.pool).await?;
        Ok(())
    }

    /// Email channel configuration repository.
    #[must_use]
    pub fn configs(&self) -> EmailConfigRepository {
        EmailConfigRepository::new(self.pool.clone())
    }

    /// Visitor contact repository.
    #[must_use]
    pub fn visitors(&self) -> VisitorRepository {
        VisitorRepository::new(self.pool.clone())
    }

    /// Conversation repository.
    #[must_use]
    pub fn conversations(&self) -> ConversationRepository {
        ConversationRepository::new(self.pool.clone())
    }

    /// Message repository.
    #[must_use]
    pub fn messages(&self) -> MessageRepository {
        MessageRepository::new(self.pool.clone())
    }

    /// Email thread index repository.
    #[must_use]
    pub fn threads(&self) -> ThreadRepository {
        ThreadRepository::new(self.pool.clone())
    }

    /// Durable job queue repository.
    #[must_use]
    pub fn jobs(&self) -> JobRepository {
        JobRepository::new(self.pool.clone())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Parse an RFC 3339 TEXT column, falling back to the Unix epoch for
/// rows written by hand or by older builds.
pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
