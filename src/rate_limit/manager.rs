//! Rate Limit Manager
//!
//! Checks a request against the global, per-source and per-credential
//! windows and charges it to all of them in one step.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::config::{CountingPolicy, RateLimitConfig, ScopeLimit};
use super::store::{lock_window, WindowHandle, WindowStore};
use super::window::{Scope, ScopeKey};

/// Identities a request is limited by
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitKeys<'a> {
    /// Source network address
    pub source: Option<&'a str>,

    /// Credential subject; anonymous requests have none
    pub credential: Option<&'a str>,
}

impl<'a> RateLimitKeys<'a> {
    pub fn new(source: Option<&'a str>, credential: Option<&'a str>) -> Self {
        Self { source, credential }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request admitted and counted
    Allowed {
        /// Requests left in the tightest scope
        remaining: u32,
    },
    /// A scope is exhausted
    Limited {
        scope: Scope,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Create an allowed result
    pub fn allowed(remaining: u32) -> Self {
        RateLimitDecision::Allowed { remaining }
    }

    /// Create a denied result
    pub fn limited(scope: Scope, retry_after: Duration) -> Self {
        RateLimitDecision::Limited { scope, retry_after }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Rate limit manager
#[derive(Debug, Clone)]
pub struct RateLimitManager {
    /// Configuration
    config: Arc<RwLock<RateLimitConfig>>,

    /// Window store
    store: WindowStore,

    clock: Arc<dyn Clock>,
}

impl RateLimitManager {
    /// Create a new rate limit manager
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit time source
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            store: WindowStore::new(),
            clock,
        }
    }

    /// Create a disabled rate limit manager (for testing)
    pub fn disabled() -> Self {
        Self::new(RateLimitConfig::disabled())
    }

    /// Check a request and count it
    ///
    /// All applicable windows are locked in scope order, checked, and then
    /// incremented together, so concurrent requests cannot overshoot a limit.
    pub async fn check(&self, keys: RateLimitKeys<'_>) -> RateLimitDecision {
        let config = self.config.read().await.clone();
        if !config.enabled {
            return RateLimitDecision::allowed(u32::MAX);
        }

        let now = self.clock.now();
        let candidates = [
            Some(ScopeKey::global()),
            keys.source.map(ScopeKey::source),
            keys.credential.map(ScopeKey::credential),
        ];

        let mut slots: Vec<(Scope, ScopeLimit, WindowHandle)> = Vec::with_capacity(3);
        for key in candidates.into_iter().flatten() {
            let limit = config.limit_for(key.scope);
            if limit.limit == 0 {
                continue;
            }
            let handle = self.store.get_or_create(&key, now).await;
            slots.push((key.scope, limit, handle));
        }

        let mut guards: Vec<_> = slots
            .iter()
            .map(|(scope, limit, handle)| (*scope, *limit, lock_window(handle)))
            .collect();

        for (_, limit, window) in guards.iter_mut() {
            window.roll(now, limit.window);
        }

        let exhausted = guards
            .iter()
            .find(|(_, limit, window)| window.count() >= limit.limit)
            .map(|(scope, limit, window)| (*scope, window.retry_after(now, limit.window)));

        if let Some((scope, retry_after)) = exhausted {
            if config.counting == CountingPolicy::AllAttempts {
                for (_, limit, window) in guards.iter_mut() {
                    if window.count() < limit.limit {
                        window.increment();
                    }
                }
            }
            debug!(scope = %scope, ?retry_after, "Rate limit exceeded");
            return RateLimitDecision::limited(scope, retry_after);
        }

        let mut remaining = u32::MAX;
        for (_, limit, window) in guards.iter_mut() {
            window.increment();
            remaining = remaining.min(limit.limit - window.count());
        }

        RateLimitDecision::allowed(remaining)
    }

    /// Current count for one scope key; 0 if its window has expired
    pub async fn count(&self, key: &ScopeKey) -> u32 {
        let limit = self.config.read().await.limit_for(key.scope);
        match self.store.get(key).await {
            Some(handle) => {
                let window = lock_window(&handle);
                if window.is_expired(self.clock.now(), limit.window) {
                    0
                } else {
                    window.count()
                }
            }
            None => 0,
        }
    }

    /// Drop expired windows; returns how many were removed
    pub async fn prune_expired(&self) -> usize {
        let config = self.config.read().await.clone();
        let removed = self
            .store
            .prune(self.clock.now(), |scope| config.limit_for(scope).window)
            .await;
        if removed > 0 {
            debug!(removed, "Pruned expired rate limit windows");
        }
        removed
    }

    /// Clear all counters
    pub async fn reset(&self) {
        self.store.clear().await;
    }

    /// Update configuration
    pub async fn update_config(&self, config: RateLimitConfig) {
        let mut current = self.config.write().await;
        *current = config;
    }

    /// Get current configuration
    pub async fn get_config(&self) -> RateLimitConfig {
        self.config.read().await.clone()
    }

    /// Get window store (for stats)
    pub fn store(&self) -> &WindowStore {
        &self.store
    }
}
