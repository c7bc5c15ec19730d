//! Background worker draining the durable job queue.

use std::time::Duration;

use chrono::Utc;
use maildesk_transport::Mailer;
use tracing::{debug, warn};

use super::delivery::{SendDisposition, dispatch_send};
use super::notify::{NotificationEvent, Notifier};
use crate::jobs::{Job, JobKind, SendEmailJob};
use crate::message::DeliveryStatus;
use crate::store::Database;
use crate::{Error, Result};

/// Tuning knobs of the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// How often the queue is polled.
    pub interval: Duration,
    /// Maximum jobs drained per poll.
    pub batch_size: i64,
    /// Attempts before a transiently failing job is given up on.
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub backoff_base: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            batch_size: 25,
            max_attempts: 6,
            backoff_base: Duration::from_secs(30),
        }
    }
}

impl WorkerOptions {
    /// Delay before the next try of a job that has run `attempts` times:
    /// `backoff_base · 2^(attempts-1)`.
    #[must_use]
    fn backoff(&self, attempts: u32) -> Duration {
        self.backoff_base * 2_u32.saturating_pow(attempts.saturating_sub(1))
    }
}

/// Drain every due job once; returns how many were executed.
///
/// Jobs are claimed with a single compare-and-set, so several workers
/// can drain the same queue without doubling work. Transient failures
/// are rescheduled with exponential backoff until the attempt budget is
/// spent; a spent send job leaves its message `failed`.
///
/// # Errors
///
/// Returns an error if the queue itself cannot be read; failures of
/// individual jobs are absorbed into their rows.
pub async fn drain_due_jobs(
    db: &Database,
    mailer: &impl Mailer,
    notifier: &impl Notifier,
    options: &WorkerOptions,
) -> Result<usize> {
    let now = Utc::now();
    let due = db.jobs().due(now, options.batch_size).await?;
    let mut executed = 0;

    for job in due {
        if !db.jobs().claim(job.id, now).await? {
            continue;
        }
        // The claim we just won is attempt `job.attempts + 1`.
        let attempts = job.attempts + 1;
        run_job(db, mailer, notifier, options, &job, attempts).await?;
        executed += 1;
    }

    Ok(executed)
}

async fn run_job(
    db: &Database,
    mailer: &impl Mailer,
    notifier: &impl Notifier,
    options: &WorkerOptions,
    job: &Job,
    attempts: u32,
) -> Result<()> {
    match job.kind {
        JobKind::SendEmail => {
            let payload: SendEmailJob = match serde_json::from_str(&job.payload) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("send job {} has an unreadable payload: {err}", job.id);
                    return db.jobs().fail(job.id, &err.to_string()).await;
                }
            };

            match dispatch_send(db, mailer, &payload).await {
                Ok(SendDisposition::Sent | SendDisposition::Skipped) => {
                    db.jobs().complete(job.id).await
                }
                Ok(SendDisposition::Failed(reason)) => db.jobs().fail(job.id, &reason).await,
                Ok(SendDisposition::Retry(reason)) => {
                    if attempts >= options.max_attempts {
                        warn!(
                            "send job {} exhausted {attempts} attempts: {reason}",
                            job.id
                        );
                        db.messages()
                            .set_delivery_status(payload.message_id, DeliveryStatus::Failed)
                            .await?;
                        db.jobs().fail(job.id, &reason).await
                    } else {
                        db.jobs()
                            .retry_after(job.id, options.backoff(attempts), &reason)
                            .await
                    }
                }
                Err(Error::NotFound(what)) => {
                    warn!("send job {} points at a missing record: {what}", job.id);
                    db.jobs().fail(job.id, &what).await
                }
                Err(err) => Err(err),
            }
        }
        JobKind::Notify => {
            let event: NotificationEvent = match serde_json::from_str(&job.payload) {
                Ok(event) => event,
                Err(err) => {
                    warn!("notify job {} has an unreadable payload: {err}", job.id);
                    return db.jobs().fail(job.id, &err.to_string()).await;
                }
            };

            match notifier.notify(&event).await {
                Ok(()) => db.jobs().complete(job.id).await,
                Err(err) => {
                    let reason = err.to_string();
                    if attempts >= options.max_attempts {
                        warn!(
                            "notify job {} exhausted {attempts} attempts: {reason}",
                            job.id
                        );
                        db.jobs().fail(job.id, &reason).await
                    } else {
                        db.jobs()
                            .retry_after(job.id, options.backoff(attempts), &reason)
                            .await
                    }
                }
            }
        }
    }
}

/// Run the worker loop until the task is dropped.
///
/// Polls on a fixed interval; a failing poll is logged and retried on
/// the next tick rather than tearing the worker down.
pub async fn run_worker(
    db: Database,
    mailer: impl Mailer,
    notifier: impl Notifier,
    options: WorkerOptions,
) {
    let mut interval = tokio::time::interval(options.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match drain_due_jobs(&db, &mailer, &notifier, &options).await {
            Ok(0) => {}
            Ok(executed) => debug!("worker executed {executed} job(s)"),
            Err(err) => warn!("worker poll failed: {err}"),
        }
    }
}
