//! Tool Specifications
//!
//! Static description of each exposed tool: binary, category, argument
//! grammar, capability requirement and timeout bounds.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::capabilities::Capability;
use super::timeout::TimeoutBounds;

/// Broad tool category; used for scope checks and listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// Remote command execution
    Remote,
    /// Port and host scanning
    Scan,
    /// DNS and registry lookups
    Dns,
    /// HTTP clients and web scanners
    Web,
    /// TLS auditing
    Tls,
    /// Reachability and path diagnostics
    Network,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Remote => "remote",
            ToolCategory::Scan => "scan",
            ToolCategory::Dns => "dns",
            ToolCategory::Web => "web",
            ToolCategory::Tls => "tls",
            ToolCategory::Network => "network",
        }
    }

    pub const ALL: [ToolCategory; 6] = [
        ToolCategory::Remote,
        ToolCategory::Scan,
        ToolCategory::Dns,
        ToolCategory::Web,
        ToolCategory::Tls,
        ToolCategory::Network,
    ];
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How positional words name their targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionalKind {
    /// Host, address or CIDR range, optionally `host:port`
    Host,
    /// URL; scheme optional, host extracted
    Url,
}

/// Argument grammar for one tool
///
/// Option lists hold the spelling a caller would type (`-p`, `--proxy`).
#[derive(Debug, Clone, Copy)]
pub struct ArgGrammar {
    /// Options that take the next word (or an attached value) as their value
    pub value_options: &'static [&'static str],

    /// Options whose value names a host to contact
    pub target_options: &'static [&'static str],

    /// Options whose value is a comma-separated list of hosts
    pub target_list_options: &'static [&'static str],

    /// Options that are never accepted
    pub denied_options: &'static [&'static str],

    /// Options that need raw socket access
    pub privileged_options: &'static [&'static str],

    /// Positional words that are keywords rather than targets (case-insensitive)
    pub keywords: &'static [&'static str],

    pub positional: PositionalKind,

    /// Bare numbers after the first host are ports or sizes (`nc host 80`)
    pub trailing_numbers: bool,

    /// Single-letter options accept an attached value (`-p22`) and may be clustered (`-sSv`)
    pub getopt_short: bool,

    /// `+option` words (dig)
    pub plus_options: bool,

    /// `@server` names a target (dig)
    pub at_server: bool,

    /// Option values starting with `@` read local files (curl)
    pub reject_file_values: bool,
}

impl ArgGrammar {
    /// Grammar with no options at all
    pub const fn plain(positional: PositionalKind) -> Self {
        Self {
            value_options: &[],
            target_options: &[],
            target_list_options: &[],
            denied_options: &[],
            privileged_options: &[],
            keywords: &[],
            positional,
            trailing_numbers: false,
            getopt_short: true,
            plus_options: false,
            at_server: false,
            reject_file_values: false,
        }
    }
}

/// Description of one tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,

    /// Executable looked up on PATH
    pub binary: &'static str,

    pub description: &'static str,

    pub category: ToolCategory,

    /// Capability needed regardless of arguments
    pub capability: Option<Capability>,

    pub timeouts: TimeoutBounds,

    /// Arguments prepended unless the caller already supplied the option
    #[serde(skip)]
    pub default_args: &'static [(&'static [&'static str], &'static [&'static str])],

    /// Remote execution tool (`user@host -- words`)
    pub remote: bool,

    pub enabled: bool,

    #[serde(skip)]
    pub grammar: ArgGrammar,
}

impl ToolSpec {
    /// Whether a capability is needed given the options present
    pub fn required_capability(&self, privileged_option_used: bool) -> Option<Capability> {
        self.capability.or(if privileged_option_used {
            Some(Capability::NetRaw)
        } else {
            None
        })
    }
}
