//! Remote data service module.
//!
//! This module provides the `CustomerService` trait the cache talks to,
//! and `ApiClient`, its REST implementation over reqwest.
//!
//! Every remote failure is reported as an `ApiError` that classifies into
//! one of three kinds: not found, validation, or remote.

pub mod client;
pub mod error;
pub mod service;

pub use client::ApiClient;
pub use error::{ApiError, ErrorKind};
pub use service::{CustomerService, PageSize};
