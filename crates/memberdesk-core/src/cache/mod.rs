//! Session-scoped customer cache.
//!
//! This module provides `CustomerCache`, the single source of truth for
//! the customer collection during a UI session. It serves reads without
//! redundant network calls, runs at most one full load at a time, and
//! applies every successful remote mutation to the local collection.
//!
//! There is no TTL or eviction: the collection is replaced only by a
//! forced refresh and cleared only when the session is reset.

pub mod manager;

pub use manager::CustomerCache;
