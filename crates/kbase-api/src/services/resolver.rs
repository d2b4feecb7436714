//! System DNS lookups for the scrape URL guard.

use std::net::IpAddr;

use async_trait::async_trait;
use tracing::debug;

use kbase_core::{Error, HostResolver, Result};

/// Resolves through the OS resolver via `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>> {
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| Error::Request(format!("DNS lookup failed for {}: {}", host, e)))?
            .map(|addr| addr.ip())
            .collect();
        debug!(
            subsystem = "api",
            component = "url_guard",
            host,
            addrs = addrs.len(),
            "Host resolved"
        );
        Ok(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_ip_literal() {
        let addrs = DnsResolver.resolve("127.0.0.1", 80).await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }
}
