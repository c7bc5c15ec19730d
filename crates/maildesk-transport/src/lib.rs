//! # maildesk-transport
//!
//! HTTP boundary to the outbound mail provider.
//!
//! The provider is a black box reached over a JSON send API: maildesk hands
//! it a fully composed email (threading headers included) and later receives
//! delivery outcomes through webhooks. This crate provides:
//!
//! - **`Mailer`**: the async send seam the delivery dispatcher runs against
//! - **`HttpMailer`**: the production implementation (bearer-authenticated
//!   JSON POST with a bounded request timeout)
//! - **Wire types**: the outbound email payload, the provider's send
//!   receipt, and the delivery-status webhook event
//! - **Error classification**: permanent vs transient failures, which drives
//!   the dispatcher's retry decision
//!
//! ## Quick Start
//!
//! ```ignore
//! use maildesk_transport::{HttpMailer, Mailer, OutboundEmail};
//!
//! let mailer = HttpMailer::new("https://mail.example.com/api", Some("key".into()))?;
//! let receipt = mailer.send(&email).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
mod error;
pub mod types;

pub use client::{HttpMailer, Mailer};
pub use error::{Error, Result};
pub use types::{DeliveryEvent, DeliveryOutcome, EmailAttachment, OutboundEmail, SendReceipt};
