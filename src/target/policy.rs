//! Target Policy
//!
//! Whitelist and blacklist entries as loaded from configuration. Entries are
//! parsed once when the policy is built; a malformed entry fails the load
//! rather than silently never matching.

use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

use super::cidr::{canonical_ip, IpNetwork, NetworkParseError};

/// Error building a target policy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("empty policy entry")]
    Empty,

    #[error("invalid network entry: {0}")]
    Network(#[from] NetworkParseError),

    #[error("wildcard entry '{0}' must have the form '*.domain'")]
    Wildcard(String),

    #[error("entry '{0}' contains characters not allowed in a host name")]
    InvalidDomain(String),
}

/// A single whitelist or blacklist entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEntry {
    /// Single address or CIDR range
    Network(IpNetwork),
    /// Exact domain, lowercased, without trailing dot
    Domain(String),
    /// `*.suffix`; stores the suffix. Matches strict subdomains only.
    Wildcard(String),
}

impl PolicyEntry {
    /// Parse a configured entry
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        let entry = raw.trim();
        if entry.is_empty() {
            return Err(PolicyError::Empty);
        }

        if let Some(suffix) = entry.strip_prefix("*.") {
            let suffix = normalize_domain(suffix);
            if suffix.is_empty() || suffix.contains('*') {
                return Err(PolicyError::Wildcard(entry.to_string()));
            }
            check_domain_chars(&suffix)?;
            return Ok(PolicyEntry::Wildcard(suffix));
        }
        if entry.contains('*') {
            return Err(PolicyError::Wildcard(entry.to_string()));
        }

        if entry.contains('/') {
            return Ok(PolicyEntry::Network(entry.parse()?));
        }
        if let Ok(ip) = strip_brackets(entry).parse::<IpAddr>() {
            return Ok(PolicyEntry::Network(IpNetwork::host(canonical_ip(ip))));
        }

        let domain = normalize_domain(entry);
        check_domain_chars(&domain)?;
        Ok(PolicyEntry::Domain(domain))
    }

    /// Whether this entry matches a single address
    pub(crate) fn matches_ip(&self, ip: IpAddr) -> bool {
        match self {
            PolicyEntry::Network(net) => net.contains(ip),
            _ => false,
        }
    }

    /// Whether this entry matches a domain name
    ///
    /// Address entries never match names; no resolution is performed.
    pub(crate) fn matches_domain(&self, domain: &str) -> bool {
        match self {
            PolicyEntry::Domain(d) => d == domain,
            PolicyEntry::Wildcard(suffix) => domain
                .strip_suffix(suffix.as_str())
                .is_some_and(|head| head.len() > 1 && head.ends_with('.')),
            PolicyEntry::Network(_) => false,
        }
    }
}

impl fmt::Display for PolicyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyEntry::Network(net) if net.is_host() => write!(f, "{}", net.addr()),
            PolicyEntry::Network(net) => write!(f, "{}", net),
            PolicyEntry::Domain(d) => write!(f, "{}", d),
            PolicyEntry::Wildcard(s) => write!(f, "*.{}", s),
        }
    }
}

impl Serialize for PolicyEntry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whitelist/blacklist policy applied to every scan target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetPolicy {
    /// Entries that are always denied
    pub blacklist: Vec<PolicyEntry>,

    /// When non-empty, only matching targets are allowed
    pub whitelist: Vec<PolicyEntry>,

    /// Allow loopback, link-local and private ranges
    pub allow_private_ips: bool,
}

impl TargetPolicy {
    /// Build a policy from raw configured entries
    pub fn from_entries<S: AsRef<str>>(
        whitelist: &[S],
        blacklist: &[S],
        allow_private_ips: bool,
    ) -> Result<Self, PolicyError> {
        let parse = |entries: &[S]| -> Result<Vec<PolicyEntry>, PolicyError> {
            entries
                .iter()
                .map(|e| PolicyEntry::parse(e.as_ref()))
                .collect()
        };

        Ok(Self {
            whitelist: parse(whitelist)?,
            blacklist: parse(blacklist)?,
            allow_private_ips,
        })
    }

    /// Policy with no lists that allows private addresses (for tests)
    pub fn permissive() -> Self {
        Self {
            allow_private_ips: true,
            ..Self::default()
        }
    }
}

pub(crate) fn normalize_domain(s: &str) -> String {
    s.trim().trim_end_matches('.').to_ascii_lowercase()
}

pub(crate) fn strip_brackets(s: &str) -> &str {
    s.strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(s)
}

fn check_domain_chars(domain: &str) -> Result<(), PolicyError> {
    let ok = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if ok && !domain.is_empty() {
        Ok(())
    } else {
        Err(PolicyError::InvalidDomain(domain.to_string()))
    }
}
