//! Conversations: the thread containers agents work in.
//!
//! The engine creates a conversation when no thread match exists, reopens
//! closed ones when a match arrives, and maintains the unread counters and
//! `last_message_at` ordering field. Everything else about conversations
//! (assignment, closing, tags) belongs to the surrounding platform.

mod model;
mod repository;

pub use model::{Conversation, ConversationId, ConversationStatus};
pub use repository::ConversationRepository;
