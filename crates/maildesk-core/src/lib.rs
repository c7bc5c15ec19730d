//! # maildesk-core
//!
//! Email-channel engine for a multi-tenant support platform.
//!
//! This crate provides:
//! - **Thread Matching** - resolve inbound email to conversations via
//!   Message-ID / In-Reply-To / References chains with ordered fallbacks
//! - **Inbound Ingestion** - webhook-authenticated pipelines for direct and
//!   forwarded mail, idempotent against replayed deliveries
//! - **Reply Composition** - authorized, threaded outbound replies with
//!   synthetic Message-IDs
//! - **Delivery Reconciliation** - provider callbacks applied back onto the
//!   correct message, mismatches rejected without writes
//! - **Durable Jobs** - a SQLite-backed queue decoupling pipeline latency
//!   from transport latency

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod conversation;
mod error;
pub mod jobs;
pub mod message;
pub mod normalize;
pub mod service;
mod store;
pub mod tenant;
pub mod thread;
pub mod visitor;

pub use config::{EmailConfig, EmailConfigRepository, EmailSettings};
pub use conversation::{Conversation, ConversationId, ConversationRepository, ConversationStatus};
pub use error::{Error, Result};
pub use jobs::{Job, JobId, JobKind, JobRepository, JobStatus, SendEmailJob};
pub use message::{Attachment, DeliveryStatus, Message, MessageId, MessageRepository, SenderType};
pub use normalize::{extract_email_address, normalize_subject, strip_forward_prefix};
pub use service::{
    Authorizer, EmailIngress, ForwardedEmail, InboundEmail, IngressReceipt, NotificationEvent,
    NotificationKind, Notifier, ReconcileOutcome, ReplyComposer, ReplyReceipt, ReplyRequest,
    WebhookPolicy, WorkerOptions, drain_due_jobs, permissions, run_worker, update_delivery_status,
    update_delivery_status_by_external_id,
};
pub use store::Database;
pub use tenant::{AgentId, WorkspaceId};
pub use thread::{MatchKeys, ThreadRecord, ThreadRepository, resolve_conversation};
pub use visitor::{Visitor, VisitorId, VisitorRepository};
