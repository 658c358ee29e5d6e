//! Target Validation
//!
//! Decides whether a host, address or network may be scanned. The decision is
//! a pure function of the target string and the policy.
//!
//! Order of checks (first match wins):
//! 1. blacklist
//! 2. private/loopback/link-local ranges, unless `allow_private_ips`
//! 3. whitelist, when non-empty

use lazy_static::lazy_static;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

use super::cidr::{canonical_ip, IpNetwork};
use super::policy::{normalize_domain, strip_brackets, PolicyEntry, TargetPolicy};

lazy_static! {
    static ref PRIVATE_RANGES: Vec<IpNetwork> = [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "::/128",
        "::1/128",
        "fc00::/7",
        "fe80::/10",
    ]
    .iter()
    .map(|s| s.parse().expect("Invalid built-in private range"))
    .collect();
}

/// Why a target was denied
///
/// Only the category is reported; policy contents never leave the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    Blacklist,
    PrivateAddress,
    NotWhitelisted,
    Malformed,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Blacklist => "blacklist",
            DenyReason::PrivateAddress => "private-address",
            DenyReason::NotWhitelisted => "whitelist",
            DenyReason::Malformed => "malformed",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// A parsed scan target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Ip(IpAddr),
    Network(IpNetwork),
    Domain(String),
}

impl Target {
    /// Parse and normalize a raw target
    ///
    /// Returns `None` for empty input, embedded whitespace, and numeric forms
    /// that resolvers would reinterpret as addresses (`127.1`, `2130706433`,
    /// `0x7f000001`, `10.0.0.1-20`).
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.contains('/') {
            let net: IpNetwork = trimmed.parse().ok()?;
            return Some(if net.is_host() {
                Target::Ip(net.addr())
            } else {
                Target::Network(net)
            });
        }

        if let Ok(ip) = strip_brackets(trimmed).parse::<IpAddr>() {
            return Some(Target::Ip(canonical_ip(ip)));
        }

        let domain = normalize_domain(trimmed);
        let valid_chars = !domain.is_empty()
            && domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
        if !valid_chars || domain.split('.').any(str::is_empty) {
            return None;
        }

        // Real TLDs start with a letter; anything else is an address in disguise.
        let last = domain.rsplit('.').next()?;
        if !last.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return None;
        }

        Some(Target::Domain(domain))
    }

    fn is_private(&self) -> bool {
        match self {
            Target::Ip(ip) => PRIVATE_RANGES.iter().any(|r| r.contains(*ip)),
            Target::Network(net) => PRIVATE_RANGES.iter().any(|r| r.overlaps(net)),
            Target::Domain(d) => d == "localhost" || d.ends_with(".localhost"),
        }
    }
}

impl TargetPolicy {
    /// Validate a single target against this policy
    pub fn validate(&self, target: &str) -> Verdict {
        let Some(parsed) = Target::parse(target) else {
            return Verdict::Deny(DenyReason::Malformed);
        };

        let blacklisted = self.blacklist.iter().any(|entry| match &parsed {
            Target::Ip(ip) => entry.matches_ip(*ip),
            Target::Network(net) => match entry {
                PolicyEntry::Network(bl) => bl.overlaps(net),
                _ => false,
            },
            Target::Domain(d) => entry.matches_domain(d),
        });
        if blacklisted {
            return Verdict::Deny(DenyReason::Blacklist);
        }

        if !self.allow_private_ips && parsed.is_private() {
            return Verdict::Deny(DenyReason::PrivateAddress);
        }

        if !self.whitelist.is_empty() {
            let whitelisted = self.whitelist.iter().any(|entry| match &parsed {
                Target::Ip(ip) => entry.matches_ip(*ip),
                Target::Network(net) => match entry {
                    PolicyEntry::Network(wl) => wl.contains_network(net),
                    _ => false,
                },
                Target::Domain(d) => entry.matches_domain(d),
            });
            if !whitelisted {
                return Verdict::Deny(DenyReason::NotWhitelisted);
            }
        }

        Verdict::Allow
    }

    /// Validate several targets; the first denial wins
    pub fn validate_all<'a, I>(&self, targets: I) -> Verdict
    where
        I: IntoIterator<Item = &'a str>,
    {
        targets
            .into_iter()
            .map(|t| self.validate(t))
            .find(|v| !v.is_allowed())
            .unwrap_or(Verdict::Allow)
    }
}

/// Validate `target` against `policy`
pub fn validate(target: &str, policy: &TargetPolicy) -> Verdict {
    policy.validate(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(whitelist: &[&str], blacklist: &[&str], allow_private: bool) -> TargetPolicy {
        TargetPolicy::from_entries(whitelist, blacklist, allow_private).unwrap()
    }

    #[test]
    fn test_public_target_allowed_by_default() {
        let p = TargetPolicy::default();
        assert_eq!(p.validate("example.com"), Verdict::Allow);
        assert_eq!(p.validate("93.184.216.34"), Verdict::Allow);
        assert_eq!(p.validate("2606:2800:220:1::1"), Verdict::Allow);
    }

    #[test]
    fn test_private_addresses_denied() {
        let p = TargetPolicy::default();
        for t in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "::1",
            "[::1]",
            "fe80::1",
            "fd00::1",
            "::ffff:127.0.0.1",
            "localhost",
            "LOCALHOST.",
            "foo.localhost",
        ] {
            assert_eq!(
                p.validate(t),
                Verdict::Deny(DenyReason::PrivateAddress),
                "{} should be private",
                t
            );
        }
    }

    #[test]
    fn test_private_allowed_when_configured() {
        let p = TargetPolicy::permissive();
        assert_eq!(p.validate("127.0.0.1"), Verdict::Allow);
        assert_eq!(p.validate("192.168.0.0/24"), Verdict::Allow);
    }

    #[test]
    fn test_blacklist_beats_whitelist() {
        let p = policy(&["*.example.com"], &["bad.example.com"], true);
        assert_eq!(p.validate("good.example.com"), Verdict::Allow);
        assert_eq!(
            p.validate("bad.example.com"),
            Verdict::Deny(DenyReason::Blacklist)
        );
    }

    #[test]
    fn test_blacklist_checked_before_private() {
        let p = policy(&[], &["127.0.0.0/8"], false);
        assert_eq!(
            p.validate("127.0.0.1"),
            Verdict::Deny(DenyReason::Blacklist)
        );
    }

    #[test]
    fn test_blacklisted_cidr_denies_member() {
        let p = policy(&[], &["203.0.113.0/24"], false);
        assert_eq!(
            p.validate("203.0.113.9"),
            Verdict::Deny(DenyReason::Blacklist)
        );
        assert_eq!(p.validate("203.0.114.9"), Verdict::Allow);
    }

    #[test]
    fn test_whitelist_required_when_non_empty() {
        let p = policy(&["example.com", "198.51.100.0/24"], &[], false);
        assert_eq!(p.validate("example.com"), Verdict::Allow);
        assert_eq!(p.validate("198.51.100.20"), Verdict::Allow);
        assert_eq!(
            p.validate("other.org"),
            Verdict::Deny(DenyReason::NotWhitelisted)
        );
        assert_eq!(
            p.validate("www.example.com"),
            Verdict::Deny(DenyReason::NotWhitelisted)
        );
    }

    #[test]
    fn test_cidr_whitelist_does_not_match_domains() {
        let p = policy(&["93.184.216.0/24"], &[], false);
        assert_eq!(
            p.validate("example.com"),
            Verdict::Deny(DenyReason::NotWhitelisted)
        );
    }

    #[test]
    fn test_wildcard_does_not_match_apex() {
        let p = policy(&["*.example.com"], &[], false);
        assert_eq!(p.validate("api.example.com"), Verdict::Allow);
        assert_eq!(
            p.validate("example.com"),
            Verdict::Deny(DenyReason::NotWhitelisted)
        );
    }

    #[test]
    fn test_domain_matching_case_insensitive() {
        let p = policy(&[], &["Evil.Example"], false);
        assert_eq!(
            p.validate("EVIL.example."),
            Verdict::Deny(DenyReason::Blacklist)
        );
    }

    #[test]
    fn test_network_targets() {
        let p = policy(&["198.51.100.0/24"], &["198.51.100.128/25"], false);
        assert_eq!(p.validate("198.51.100.0/26"), Verdict::Allow);
        assert_eq!(
            p.validate("198.51.100.0/24"),
            Verdict::Deny(DenyReason::Blacklist)
        );
        assert_eq!(
            p.validate("198.50.0.0/16"),
            Verdict::Deny(DenyReason::NotWhitelisted)
        );

        let p = TargetPolicy::default();
        assert_eq!(
            p.validate("10.0.0.0/24"),
            Verdict::Deny(DenyReason::PrivateAddress)
        );
        assert_eq!(
            p.validate("0.0.0.0/0"),
            Verdict::Deny(DenyReason::PrivateAddress)
        );
    }

    #[test]
    fn test_mapped_networks_checked_as_ipv4() {
        let p = policy(&[], &["10.0.0.0/8"], true);
        for t in ["10.1.0.0/16", "::ffff:10.1.2.3", "::ffff:10.1.0.0/112"] {
            assert_eq!(p.validate(t), Verdict::Deny(DenyReason::Blacklist), "{}", t);
        }

        let p = TargetPolicy::default();
        assert_eq!(
            p.validate("::ffff:192.168.0.0/120"),
            Verdict::Deny(DenyReason::PrivateAddress)
        );
        assert_eq!(
            p.validate("::ffff:0:0/95"),
            Verdict::Deny(DenyReason::PrivateAddress)
        );
        assert_eq!(p.validate("::ffff:198.51.100.0/120"), Verdict::Allow);

        let p = policy(&["198.51.100.0/24"], &[], false);
        assert_eq!(p.validate("::ffff:198.51.100.0/121"), Verdict::Allow);
        assert_eq!(
            p.validate("::ffff:198.51.0.0/112"),
            Verdict::Deny(DenyReason::NotWhitelisted)
        );
    }

    #[test]
    fn test_malformed_targets() {
        let p = TargetPolicy::permissive();
        for t in [
            "",
            "   ",
            "a b",
            "0",
            "80",
            "127.1",
            "2130706433",
            "0x7f000001",
            "10.0.0.1-20",
            "host;id",
            "*.example.com",
            "a..b.com",
            "fe80::1%eth0",
            "10.0.0.0/40",
        ] {
            assert_eq!(
                p.validate(t),
                Verdict::Deny(DenyReason::Malformed),
                "{:?} should be malformed",
                t
            );
        }
    }

    #[test]
    fn test_validate_all_first_denial_wins() {
        let p = policy(&[], &["evil.example"], false);
        assert_eq!(
            p.validate_all(["example.com", "evil.example", "127.0.0.1"]),
            Verdict::Deny(DenyReason::Blacklist)
        );
        assert_eq!(p.validate_all(["example.com", "example.org"]), Verdict::Allow);
    }

    #[test]
    fn test_free_function_matches_method() {
        let p = TargetPolicy::default();
        assert_eq!(validate("127.0.0.1", &p), p.validate("127.0.0.1"));
    }

    #[test]
    fn test_deny_reason_names() {
        assert_eq!(DenyReason::Blacklist.to_string(), "blacklist");
        assert_eq!(DenyReason::PrivateAddress.to_string(), "private-address");
        assert_eq!(DenyReason::NotWhitelisted.to_string(), "whitelist");
        assert_eq!(DenyReason::Malformed.to_string(), "malformed");
    }

    proptest! {
        #[test]
        fn prop_validate_is_deterministic(target in "[a-z0-9.:/-]{0,24}") {
            let p = policy(&["*.example.com"], &["203.0.113.0/24"], false);
            prop_assert_eq!(p.validate(&target), p.validate(&target));
        }

        #[test]
        fn prop_blacklisted_address_always_denied(last in 0u8..=255, allow_private: bool) {
            let target = format!("203.0.113.{}", last);
            let p = policy(&["203.0.113.0/24"], &["203.0.113.0/24"], allow_private);
            prop_assert_eq!(p.validate(&target), Verdict::Deny(DenyReason::Blacklist));
        }

        #[test]
        fn prop_loopback_denied_without_opt_in(b in 0u8..=255, c in 0u8..=255, d in 0u8..=255) {
            let target = format!("127.{}.{}.{}", b, c, d);
            prop_assert_eq!(
                TargetPolicy::default().validate(&target),
                Verdict::Deny(DenyReason::PrivateAddress)
            );
        }
    }
}
