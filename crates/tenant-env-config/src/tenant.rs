//! Tenant key derivation from request hosts.

use log::{debug, warn};
use serde::Serialize;
use std::fmt;

/// Normalized tenant identifier taken from the first DNS label of a host.
///
/// Keys are ASCII lowercase and contain only alphanumerics, `-` and `_`, so
/// they are always safe to embed in a source name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantKey(String);

impl TenantKey {
    /// Derive the tenant key from a host such as `Alpha.example.com:8080`.
    ///
    /// Returns `None` when the host yields no usable key: an empty first
    /// label (`.example.com`), a bracketed IPv6 literal, or a label with
    /// characters outside the key alphabet.
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.trim();
        let Some(name) = strip_port(host) else {
            debug!("host has no tenant label (host={host})");
            return None;
        };
        let label = name.split_once('.').map_or(name, |(first, _)| first);
        Self::parse(label)
    }

    /// Validate and normalize a bare key, e.g. one taken from an admin path.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        if key.is_empty() {
            return None;
        }
        if !key.bytes().all(is_key_byte) {
            warn!("rejecting tenant key with invalid characters (len={})", key.len());
            return None;
        }
        Some(Self(key))
    }

    /// Borrow the normalized key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_key_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

/// Drop a trailing `:<digits>` port. Bracketed IPv6 literals carry no label.
fn strip_port(host: &str) -> Option<&str> {
    if host.starts_with('[') {
        return None;
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|byte| byte.is_ascii_digit()) => Some(name),
        _ => Some(host),
    }
}
