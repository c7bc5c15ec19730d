//! Messages: one row per email, inbound or outbound.
//!
//! A message carries the full email metadata needed to rebuild headers
//! (threading chain included) and, for outbound email only, a delivery
//! status that the dispatcher and the provider's webhooks advance.
//! Messages are immutable except for that status.

mod model;
mod repository;

pub use model::{
    Attachment, DeliveryStatus, EmailMetadata, Message, MessageId, NewMessage, SenderType,
};
pub use repository::MessageRepository;
