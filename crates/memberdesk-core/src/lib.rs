//! Core library for memberdesk.
//!
//! Provides the client-side data layer for a membership-management UI:
//!
//! - [`cache::CustomerCache`]: session-scoped customer collection with
//!   single-flight loading and read-through lookups
//! - [`fee::classify`]: pure fee-status derivation from billing dates
//! - [`api::ApiClient`]: REST implementation of [`api::CustomerService`]
//! - [`models`]: `Customer`, `CustomerId`, drafts and attachments

pub mod api;
pub mod cache;
pub mod fee;
pub mod models;

pub use api::{ApiClient, ApiError, CustomerService, ErrorKind, PageSize};
pub use cache::CustomerCache;
pub use fee::{classify, FeeStatus, FeeStatusKind, FeeSummary};
pub use models::{Attachment, Customer, CustomerDraft, CustomerId, CustomerKey};
