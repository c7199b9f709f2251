//! Data models for memberdesk entities.
//!
//! - `Customer`: a member record as served by the remote service
//! - `CustomerId`, `CustomerKey`: integer-normalized identity
//! - `CustomerDraft`: create/update payload
//! - `Attachment`: profile image upload

pub mod attachment;
pub mod customer;

pub use attachment::Attachment;
pub use customer::{Customer, CustomerDraft, CustomerId, CustomerKey};
