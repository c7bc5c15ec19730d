//! Job queue model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::MessageId;

/// Unique identifier for a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub i64);

impl JobId {
    /// Create a new job ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a queued job does when the worker picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Hand an outbound message to the mail provider.
    SendEmail,
    /// Deliver a new-message/new-conversation event to the platform.
    Notify,
}

impl JobKind {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "notify" => Self::Notify,
            _ => Self::SendEmail,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SendEmail => "send_email",
            Self::Notify => "notify",
        }
    }
}

/// Lifecycle of a queued job.
///
/// There is no separate "running" state: a claim leases the row by
/// pushing `run_after` forward, so a crashed worker's job simply comes
/// due again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to run (or leased by a worker).
    #[default]
    Queued,
    /// Ran to completion.
    Done,
    /// Gave up after exhausting its attempt budget.
    Failed,
}

impl JobStatus {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "done" => Self::Done,
            "failed" => Self::Failed,
            _ => Self::Queued,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// One row of the durable work queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique identifier.
    pub id: JobId,
    /// What to do.
    pub kind: JobKind,
    /// JSON payload interpreted per kind.
    pub payload: String,
    /// Queue status.
    pub status: JobStatus,
    /// How many times a worker has claimed this job.
    pub attempts: u32,
    /// Earliest time the job may run (or run again).
    pub run_after: DateTime<Utc>,
    /// Error recorded by the most recent failed attempt.
    pub last_error: Option<String>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
}

/// Payload of a [`JobKind::SendEmail`] job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailJob {
    /// The pending outbound message to hand to the provider.
    pub message_id: MessageId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [JobKind::SendEmail, JobKind::Notify] {
            assert_eq!(JobKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [JobStatus::Queued, JobStatus::Done, JobStatus::Failed] {
            assert_eq!(JobStatus::parse(status.as_str()), status);
        }
    }
}
