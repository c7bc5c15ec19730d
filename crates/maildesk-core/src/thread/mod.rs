//! Email thread index and conversation matching.
//!
//! Every email that passes through the engine leaves one insert-only
//! index row keyed by its Message-ID. Inbound mail is matched against
//! those rows through ordered fallbacks: exact `In-Reply-To`, then the
//! `References` chain, then a `(workspace, normalized subject, sender)`
//! composite. The unique Message-ID constraint doubles as the
//! idempotency guard against replayed webhook deliveries.

pub mod matcher;
mod model;
mod repository;

pub use matcher::{MatchKeys, resolve_conversation};
pub use model::{NewThreadRecord, ThreadRecord};
pub use repository::ThreadRepository;
