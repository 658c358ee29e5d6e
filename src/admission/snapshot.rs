//! Immutable configuration snapshots
//!
//! Every request reads one [`Snapshot`] for its whole lifetime. Reloading
//! swaps the shared `Arc`; requests already in flight keep the old one.

use std::sync::{Arc, RwLock};

use crate::auth::ScopeGate;
use crate::rate_limit::RateLimitConfig;
use crate::target::TargetPolicy;
use crate::tools::{ArgumentLimits, Capabilities, CommandBuilder, TimeoutPolicy, ToolRegistry};

/// Everything admission needs to decide on a request
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub registry: ToolRegistry,
    pub policy: TargetPolicy,
    pub rate_limit: RateLimitConfig,
    pub scopes: ScopeGate,
    pub timeout_policy: TimeoutPolicy,
    pub limits: ArgumentLimits,
    pub capabilities: Capabilities,
}

impl Snapshot {
    /// Command builder bound to this snapshot
    pub fn builder(&self) -> CommandBuilder<'_> {
        CommandBuilder::new(&self.registry, &self.policy, self.capabilities)
            .timeout_policy(self.timeout_policy)
            .limits(self.limits)
    }
}

/// Shared, swappable reference to the current snapshot
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

impl ConfigHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// The snapshot in effect right now
    pub fn current(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Install a new snapshot, returning the previous one
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(snapshot))
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}
