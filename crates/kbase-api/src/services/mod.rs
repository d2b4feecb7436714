//! Application services behind the HTTP handlers.

pub mod channel_delete;
pub mod channel_preview;
pub mod cookie_ingest;
pub mod resolver;

pub use channel_delete::ChannelDeleteTarget;
pub use channel_preview::{ChannelPage, ChannelPreviewService, PageRequest};
pub use cookie_ingest::CookieIngestService;
pub use resolver::DnsResolver;
