//! Runtime Capability Detection
//!
//! Detects whether this process can open raw sockets. Tools that need raw
//! sockets are refused up front when the capability is missing.

use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Linux capability bit for CAP_NET_RAW
const CAP_NET_RAW_BIT: u32 = 13;

/// A privilege a tool may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    NetRaw,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::NetRaw => "net_raw",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities available to this process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub net_raw: bool,
}

impl Capabilities {
    /// No capabilities
    pub fn none() -> Self {
        Self::default()
    }

    /// Every capability (for tests)
    pub fn all() -> Self {
        Self { net_raw: true }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::NetRaw => self.net_raw,
        }
    }

    /// Probe the running process
    ///
    /// Reads the effective capability set from `/proc/self/status`; where that
    /// is unavailable, falls back to checking for effective uid 0.
    pub fn detect() -> Self {
        let net_raw = match std::fs::read_to_string("/proc/self/status") {
            Ok(status) => parse_cap_eff(&status)
                .map(|caps| caps & (1u64 << CAP_NET_RAW_BIT) != 0)
                .unwrap_or_else(|| nix::unistd::geteuid().is_root()),
            Err(_) => nix::unistd::geteuid().is_root(),
        };

        let caps = Self { net_raw };
        debug!(?caps, "Detected runtime capabilities");
        caps
    }
}

/// Extract the `CapEff` mask from a `/proc/<pid>/status` document
fn parse_cap_eff(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("CapEff:"))
        .and_then(|hex| u64::from_str_radix(hex.trim(), 16).ok())
}
