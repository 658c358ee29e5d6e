//! IP Network Ranges
//!
//! Minimal CIDR arithmetic for policy entries and scanner targets.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Prefix length of `::ffff:0:0/96`
const MAPPED_PREFIX: u8 = 96;

/// Error parsing an address range
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkParseError {
    #[error("'{0}' is not a valid IP address")]
    InvalidAddress(String),

    #[error("'{0}' has an invalid prefix length")]
    InvalidPrefix(String),
}

/// An IPv4 or IPv6 network in CIDR notation
///
/// Host bits are masked off at construction, so `10.1.2.3/8` and `10.0.0.0/8`
/// compare equal. Networks inside `::ffff:0:0/96` are stored in their IPv4
/// form, so `::ffff:10.0.0.0/104` and `10.0.0.0/8` compare equal too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    /// Create a network, masking host bits
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, NetworkParseError> {
        let max = max_prefix(&addr);
        if prefix > max {
            return Err(NetworkParseError::InvalidPrefix(format!("{}/{}", addr, prefix)));
        }
        let (addr, prefix) = match addr {
            IpAddr::V6(v6) if prefix >= MAPPED_PREFIX => match v6.to_ipv4_mapped() {
                Some(v4) => (IpAddr::V4(v4), prefix - MAPPED_PREFIX),
                None => (addr, prefix),
            },
            _ => (addr, prefix),
        };
        Ok(Self {
            addr: mask(addr, prefix),
            prefix,
        })
    }

    /// Single-host network (`/32` or `/128`)
    pub fn host(addr: IpAddr) -> Self {
        let addr = canonical_ip(addr);
        let prefix = max_prefix(&addr);
        Self { addr, prefix }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Whether this network is a single address
    pub fn is_host(&self) -> bool {
        self.prefix == max_prefix(&self.addr)
    }

    /// Whether `ip` falls inside this network
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.contains_network(&Self::host(ip))
    }

    /// Whether `other` lies entirely inside this network
    ///
    /// IPv4 networks are compared as their IPv4-mapped IPv6 form, so an IPv6
    /// range covering `::ffff:0:0/96` contains the IPv4 networks inside it.
    pub fn contains_network(&self, other: &IpNetwork) -> bool {
        let (addr, prefix) = self.as_v6();
        let (other_addr, other_prefix) = other.as_v6();
        other_prefix >= prefix && mask(IpAddr::V6(other_addr), prefix) == IpAddr::V6(addr)
    }

    fn as_v6(&self) -> (Ipv6Addr, u8) {
        match self.addr {
            IpAddr::V4(v4) => (v4.to_ipv6_mapped(), self.prefix + MAPPED_PREFIX),
            IpAddr::V6(v6) => (v6, self.prefix),
        }
    }

    /// Whether the two networks share at least one address
    pub fn overlaps(&self, other: &IpNetwork) -> bool {
        self.contains_network(other) || other.contains_network(self)
    }
}

impl FromStr for IpNetwork {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('/') {
            Some((addr, prefix)) => {
                let addr: IpAddr = addr
                    .parse()
                    .map_err(|_| NetworkParseError::InvalidAddress(s.to_string()))?;
                let prefix: u8 = prefix
                    .parse()
                    .map_err(|_| NetworkParseError::InvalidPrefix(s.to_string()))?;
                Self::new(addr, prefix)
            }
            None => s
                .parse::<IpAddr>()
                .map(Self::host)
                .map_err(|_| NetworkParseError::InvalidAddress(s.to_string())),
        }
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// IPv4-mapped IPv6 addresses are treated as their IPv4 form
pub(crate) fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let masked = if prefix == 0 {
                0
            } else {
                bits & (u32::MAX << (32 - u32::from(prefix)))
            };
            IpAddr::V4(Ipv4Addr::from(masked))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let masked = if prefix == 0 {
                0
            } else {
                bits & (u128::MAX << (128 - u32::from(prefix)))
            };
            IpAddr::V6(Ipv6Addr::from(masked))
        }
    }
}
