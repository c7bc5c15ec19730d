//! Durable work queue.
//!
//! The ingestion and reply pipelines never suspend on the network: they
//! enqueue a job and return. A background worker drains the queue, runs
//! the provider send or the platform notification, and reschedules
//! transient failures with backoff. Jobs are plain SQLite rows, so
//! nothing enqueued is lost across restarts.

mod model;
mod repository;

pub use model::{Job, JobId, JobKind, JobStatus, SendEmailJob};
pub use repository::JobRepository;
