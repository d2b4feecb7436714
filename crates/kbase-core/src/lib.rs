//! # kbase-core
//!
//! Core types, traits, and pure domain logic for the kbase dashboard service.
//!
//! This crate has no I/O of its own; the db, backend, jobs and api crates
//! build on the types and traits defined here.

pub mod channel_url;
pub mod cookies;
pub mod defaults;
pub mod error;
pub mod models;
pub mod selection;
pub mod traits;
pub mod url_guard;

// Re-export commonly used types at crate root
pub use cookies::ExpiryPolicy;
pub use error::{Error, Result};
pub use models::*;
pub use selection::{BulkOutcome, SelectionSet};
pub use traits::*;
pub use url_guard::{check_url, check_url_resolved, HostResolver};
