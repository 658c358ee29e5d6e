//! Fixed Window Counters
//!
//! A window starts with the first request after the previous one expired and
//! resets once its length has elapsed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Limiting scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// All callers together
    Global,
    /// One source network address
    Source,
    /// One credential subject
    Credential,
}

impl Scope {
    /// Lock acquisition order; every request takes window locks in this order.
    pub const ALL: [Scope; 3] = [Scope::Global, Scope::Source, Scope::Credential];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Source => "source",
            Scope::Credential => "credential",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of one window: a scope and the identity within it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeKey {
    pub scope: Scope,
    pub id: String,
}

impl ScopeKey {
    pub fn global() -> Self {
        Self {
            scope: Scope::Global,
            id: String::new(),
        }
    }

    pub fn source(addr: &str) -> Self {
        Self {
            scope: Scope::Source,
            id: addr.to_string(),
        }
    }

    pub fn credential(subject: &str) -> Self {
        Self {
            scope: Scope::Credential,
            id: subject.to_string(),
        }
    }
}

/// Request counter for one window
#[derive(Debug, Clone, Copy)]
pub struct Window {
    start: Instant,
    count: u32,
}

impl Window {
    pub fn new(now: Instant) -> Self {
        Self {
            start: now,
            count: 0,
        }
    }

    /// Start a fresh window if the current one has expired
    pub fn roll(&mut self, now: Instant, length: Duration) {
        if self.is_expired(now, length) {
            self.start = now;
            self.count = 0;
        }
    }

    pub fn is_expired(&self, now: Instant, length: Duration) -> bool {
        now.saturating_duration_since(self.start) >= length
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn increment(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Time until this window resets
    pub fn retry_after(&self, now: Instant, length: Duration) -> Duration {
        (self.start + length).saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rolls_at_boundary() {
        let t0 = Instant::now();
        let len = Duration::from_secs(60);
        let mut w = Window::new(t0);
        w.increment();
        w.increment();

        w.roll(t0 + Duration::from_secs(59), len);
        assert_eq!(w.count(), 2);

        w.roll(t0 + len, len);
        assert_eq!(w.count(), 0);
    }

    #[test]
    fn test_retry_after() {
        let t0 = Instant::now();
        let len = Duration::from_secs(60);
        let w = Window::new(t0);
        assert_eq!(
            w.retry_after(t0 + Duration::from_secs(45), len),
            Duration::from_secs(15)
        );
        assert_eq!(w.retry_after(t0 + len * 2, len), Duration::ZERO);
    }

    #[test]
    fn test_scope_order() {
        let mut scopes = vec![Scope::Credential, Scope::Global, Scope::Source];
        scopes.sort();
        assert_eq!(scopes, Scope::ALL.to_vec());
    }
}
