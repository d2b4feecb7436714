//! Scrape target URL guard.
//!
//! Rejects URLs that would make the scrape backend fetch from the local
//! machine, the cloud metadata endpoint, or a private network.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use url::{Host, Url};

use crate::error::{Error, Result};

/// Hostnames blocked regardless of resolution.
const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "localhost.localdomain", "ip6-localhost"];

/// Validate a scrape target URL.
///
/// Returns the parsed URL when it is safe to forward, otherwise
/// `Error::InvalidInput` naming the reason.
pub fn check_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| blocked("invalid URL"))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(blocked(&format!("scheme '{}' is not allowed", other))),
    }

    let host = url.host().ok_or_else(|| blocked("URL has no host"))?;
    match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            if BLOCKED_HOSTNAMES.contains(&name.as_str()) || name.ends_with(".localhost") {
                return Err(blocked("local hostname"));
            }
        }
        Host::Ipv4(ip) => {
            if is_blocked_ipv4(ip) {
                return Err(blocked("private or reserved address"));
            }
        }
        Host::Ipv6(ip) => {
            if is_blocked_ipv6(ip) {
                return Err(blocked("private or reserved address"));
            }
        }
    }

    Ok(url)
}

/// Name resolution used by [`check_url_resolved`].
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Every address `host` resolves to.
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>>;
}

/// [`check_url`], then reject domains that resolve to a blocked address.
///
/// A domain that does not resolve is rejected too.
pub async fn check_url_resolved(raw: &str, resolver: &dyn HostResolver) -> Result<Url> {
    let url = check_url(raw)?;
    let host = match url.host() {
        Some(Host::Domain(name)) => name.to_string(),
        _ => return Ok(url),
    };
    let port = url.port_or_known_default().unwrap_or(80);

    let addrs = resolver
        .resolve(&host, port)
        .await
        .map_err(|_| blocked("cannot resolve hostname"))?;
    if addrs.is_empty() {
        return Err(blocked("cannot resolve hostname"));
    }
    if addrs.into_iter().any(is_blocked_ip) {
        return Err(blocked("hostname resolves to a private or reserved address"));
    }
    Ok(url)
}

/// True when `raw` passes [`check_url`].
pub fn is_allowed(raw: &str) -> bool {
    check_url(raw).is_ok()
}

/// True for addresses the scrape backend must never be pointed at.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }
    let first = ip.segments()[0];
    ip.is_unspecified()
        || ip.is_loopback()
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
        // fc00::/7 unique-local
        || (first & 0xfe00) == 0xfc00
}

fn blocked(reason: &str) -> Error {
    Error::InvalidInput(format!("URL is not allowed: {}", reason))
}
