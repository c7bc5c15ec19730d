//! Per-workspace email channel configuration.
//!
//! Each workspace that enables the email channel gets one config row
//! holding its sending identity and a forwarding address customers mail
//! into. The forwarding address is generated exactly once and never
//! regenerated, so printed material and mail-client rules stay valid.

mod model;
mod repository;

pub use model::{EmailConfig, EmailSettings, forwarding_address_for};
pub use repository::EmailConfigRepository;
