//! Rate Limiting Module
//!
//! Fixed-window request limiting over three scopes: all callers, one source
//! address, and one credential subject.
//!
//! # Features
//!
//! - Independent threshold and window length per scope (0 disables a scope)
//! - Check-and-increment across all scopes of a request as one step
//! - Explicit counting policy for denied attempts
//! - Injectable clock for deterministic tests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Rate Limit Manager                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │  │   Global    │  │   Source    │  │ Credential  │         │
//! │  │   window    │  │   windows   │  │  windows    │         │
//! │  └─────────────┘  └─────────────┘  └─────────────┘         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │         Window Store (per-key mutex, in-memory)      │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod clock;
pub mod config;
pub mod dashboard;
pub mod manager;
pub mod store;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CountingPolicy, RateLimitConfig, ScopeLimit};
pub use dashboard::RateLimitStats;
pub use manager::{RateLimitDecision, RateLimitKeys, RateLimitManager};
pub use store::WindowStore;
pub use window::{Scope, ScopeKey};
