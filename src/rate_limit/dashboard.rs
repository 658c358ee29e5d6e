//! Rate Limit Statistics
//!
//! Read-only view of limiter state for the stats endpoint and the CLI.

use serde::Serialize;

use super::config::{CountingPolicy, RateLimitConfig};
use super::manager::RateLimitManager;
use super::window::{Scope, ScopeKey};

/// Limiter statistics
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    /// Timestamp of data generation
    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub enabled: bool,

    /// Requests counted in the current global window
    pub global_current: u32,
    pub global_limit: u32,

    /// Number of source addresses with a tracked window
    pub tracked_sources: usize,
    pub per_source_limit: u32,

    /// Number of credential subjects with a tracked window
    pub tracked_credentials: usize,
    pub per_credential_limit: u32,

    pub window_secs: u64,
    pub counting: CountingPolicy,
}

impl RateLimitStats {
    /// Collect statistics from a manager
    pub async fn collect(manager: &RateLimitManager) -> Self {
        let config: RateLimitConfig = manager.get_config().await;
        let store = manager.store();

        Self {
            timestamp: chrono::Utc::now(),
            enabled: config.enabled,
            global_current: manager.count(&ScopeKey::global()).await,
            global_limit: config.global,
            tracked_sources: store.count_scope(Scope::Source).await,
            per_source_limit: config.per_source,
            tracked_credentials: store.count_scope(Scope::Credential).await,
            per_credential_limit: config.per_credential,
            window_secs: config.window_secs,
            counting: config.counting,
        }
    }
}
