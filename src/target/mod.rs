//! Target Validation Module
//!
//! Every host, address or network a tool would contact passes through here
//! before a process is spawned.
//!
//! # Architecture
//!
//! ```text
//!   raw target ──► Target::parse ──► blacklist ──► private ranges ──► whitelist ──► Verdict
//!                       │                │               │                 │
//!                   Malformed        Blacklist     PrivateAddress    NotWhitelisted
//! ```
//!
//! - `cidr.rs`: address ranges
//! - `policy.rs`: whitelist/blacklist entries parsed from configuration
//! - `validator.rs`: the validation function itself
//!
//! Domain names are compared literally. No DNS resolution happens here, so an
//! address-range whitelist entry never admits a domain name.

pub mod cidr;
pub mod policy;
pub mod validator;

pub use cidr::{IpNetwork, NetworkParseError};
pub use policy::{PolicyEntry, PolicyError, TargetPolicy};
pub use validator::{validate, DenyReason, Target, Verdict};
