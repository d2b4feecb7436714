//! # kbase-backend
//!
//! Client for the external scrape backend: typed request/response calls for
//! every endpoint the dashboard proxies, and an incremental decoder for its
//! job event streams.
//!
//! Non-success responses surface as [`kbase_core::Error::Upstream`] carrying
//! the backend's status and body, so callers can pass both through.

pub mod client;
pub mod config;
pub mod sse;

pub use client::{BackendClient, BackendResponse, Caller};
pub use config::BackendConfig;
pub use sse::{SseDecoder, SseFrame};
