//! Visitor contacts keyed by sender email.
//!
//! A visitor is the customer side of a conversation. The engine creates
//! one the first time an address writes in and reuses it afterwards;
//! visitors are never deleted here.

mod model;
mod repository;

pub use model::{Visitor, VisitorId};
pub use repository::VisitorRepository;
