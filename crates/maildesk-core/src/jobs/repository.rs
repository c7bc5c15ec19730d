//! Durable job queue storage.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::model::{Job, JobId, JobKind, JobStatus};
use crate::Result;
use crate::store::parse_timestamp;

/// How long a claim leases a job before another worker may pick it up.
const CLAIM_LEASE_MINUTES: i64 = 5;

/// Repository for the durable work queue.
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'queued',
                attempts INTEGER NOT NULL DEFAULT 0,
                run_after TEXT NOT NULL,
                last_error TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        // Index for finding due jobs
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_jobs_due ON jobs(status, run_after)
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Enqueue a job to run as soon as a worker is free.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the payload
    /// cannot be serialized.
    pub async fn enqueue<P: Serialize>(&self, kind: JobKind, payload: &P) -> Result<JobId> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            INSERT INTO jobs (kind, payload, status, run_after, created_at)
            VALUES (?, ?, 'queued', ?, ?)
            ",
        )
        .bind(kind.as_str())
        .bind(serde_json::to_string(payload)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(JobId::new(result.last_insert_rowid()))
    }

    /// Queued jobs whose `run_after` has passed, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r"
            SELECT id, kind, payload, status, attempts, run_after, last_error, created_at
            FROM jobs
            WHERE status = 'queued' AND run_after <= ?
            ORDER BY run_after ASC, id ASC
            LIMIT ?
            ",
        )
        .bind(now.to_rfc3339())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_job).collect())
    }

    /// Claim a due job for execution.
    ///
    /// A single compare-and-set statement: it bumps the attempt counter
    /// and leases the row by pushing `run_after` forward, so a crashed
    /// worker's job comes due again instead of being lost. Returns
    /// `false` when another worker claimed the job first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn claim(&self, id: JobId, now: DateTime<Utc>) -> Result<bool> {
        let lease_until = now + Duration::minutes(CLAIM_LEASE_MINUTES);

        let result = sqlx::query(
            r"
            UPDATE jobs
            SET attempts = attempts + 1, run_after = ?
            WHERE id = ? AND status = 'queued' AND run_after <= ?
            ",
        )
        .bind(lease_until.to_rfc3339())
        .bind(id.0)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a job as completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn complete(&self, id: JobId) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = 'done', last_error = NULL WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Mark a job as permanently failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn fail(&self, id: JobId, error: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = 'failed', last_error = ? WHERE id = ?")
            .bind(error)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Reschedule a job after a transient failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn retry_after(
        &self,
        id: JobId,
        delay: std::time::Duration,
        error: &str,
    ) -> Result<()> {
        let run_after = Utc::now() + Duration::from_std(delay).unwrap_or(Duration::zero());

        sqlx::query("UPDATE jobs SET run_after = ?, last_error = ? WHERE id = ?")
            .bind(run_after.to_rfc3339())
            .bind(error)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get a job by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query(
            r"
            SELECT id, kind, payload, status, attempts, run_after, last_error, created_at
            FROM jobs
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_job(&r)))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Job {
    Job {
        id: JobId::new(row.get("id")),
        kind: JobKind::parse(row.get("kind")),
        payload: row.get("payload"),
        status: JobStatus::parse(row.get("status")),
        attempts: row.get::<i64, _>("attempts") as u32,
        run_after: parse_timestamp(&row.get::<String, _>("run_after")),
        last_error: row.get("last_error"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}
