//! Origin allow-listing.
//!
//! A request's declared origin is accepted when it matches a verified domain
//! exactly (scheme-insensitive host comparison) or falls inside an
//! allow-listed CIDR block. Either mechanism suffices; both may be configured
//! at once.
//!
//! A production credential with an empty allowlist is a configuration error
//! and rejects all traffic (fail closed). Sandbox credentials with an empty
//! allowlist are permissive, so integrations can be brought up before domain
//! verification.

use std::net::IpAddr;

use crate::credential::{Credential, Environment};

/// Normalize a declared origin to a bare lower-case host.
///
/// Strips scheme, path, and port; unwraps bracketed IPv6 literals.
///
/// # Example
///
/// ```
/// use zito_protocol::allowlist::normalize_origin;
///
/// assert_eq!(normalize_origin("https://Shop.Example:8443/checkout"), "shop.example");
/// assert_eq!(normalize_origin("[2001:db8::1]:443"), "2001:db8::1");
/// ```
pub fn normalize_origin(raw: &str) -> String {
    let mut host = raw.trim().to_lowercase();
    if let Some(idx) = host.find("://") {
        host.drain(..idx + 3);
    }
    if let Some(idx) = host.find('/') {
        host.truncate(idx);
    }
    if host.starts_with('[') {
        if let Some(end) = host.find(']') {
            return host[1..end].to_string();
        }
        return host;
    }
    // Strip a trailing `:port`, but leave bare IPv6 (multiple colons) alone.
    if host.matches(':').count() == 1 {
        if let Some(idx) = host.rfind(':') {
            let port = &host[idx + 1..];
            if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
                host.truncate(idx);
            }
        }
    }
    host
}

/// An IPv4 or IPv6 CIDR block. A bare IP parses as /32 or /128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrBlock {
    /// Parse `a.b.c.d/len`, `addr6/len`, or a bare IP. Returns `None` on any
    /// malformed input; a bad allowlist entry never matches.
    pub fn parse(raw: &str) -> Option<Self> {
        let (addr_part, len_part) = match raw.split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (raw, None),
        };
        let network: IpAddr = addr_part.trim().parse().ok()?;
        let max_len: u8 = if network.is_ipv4() { 32 } else { 128 };
        let prefix_len = match len_part {
            Some(len) => len.trim().parse::<u8>().ok()?,
            None => max_len,
        };
        if prefix_len > max_len {
            return None;
        }
        Some(Self {
            network,
            prefix_len,
        })
    }

    /// True when `ip` falls inside this block. Address families never mix.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(network), IpAddr::V4(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - u32::from(self.prefix_len))
                };
                u32::from(network) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(network), IpAddr::V6(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - u32::from(self.prefix_len))
                };
                u128::from(network) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}

/// Check a declared origin against a credential's allowlist.
pub fn origin_allowed(credential: &Credential, declared_origin: &str) -> bool {
    let host = normalize_origin(declared_origin);
    if host.is_empty() {
        return false;
    }

    if credential.verified_domains.is_empty() && credential.allowed_origins.is_empty() {
        // Fail closed in production, open in sandbox.
        return credential.environment == Environment::Sandbox;
    }

    if credential
        .verified_domains
        .iter()
        .any(|domain| normalize_origin(domain) == host)
    {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return credential
            .allowed_origins
            .iter()
            .filter_map(|cidr| CidrBlock::parse(cidr))
            .any(|block| block.contains(ip));
    }

    false
}
