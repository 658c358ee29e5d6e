//! Rate Limit Configuration
//!
//! Thresholds and window lengths for the three limiting scopes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::window::Scope;

/// Default rate limits (requests per window)
pub const DEFAULT_GLOBAL_LIMIT: u32 = 100;
pub const DEFAULT_PER_SOURCE_LIMIT: u32 = 20;
pub const DEFAULT_PER_CREDENTIAL_LIMIT: u32 = 50;
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Which requests are charged against a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingPolicy {
    /// Only admitted requests consume capacity
    #[default]
    AllowedOnly,
    /// Denied attempts are charged too, to every scope still under its limit
    AllAttempts,
}

/// Limit and window for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLimit {
    /// Requests per window; 0 disables the scope
    pub limit: u32,

    /// Window length
    pub window: Duration,
}

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,

    /// Requests per window across all callers
    pub global: u32,

    /// Requests per window per source address
    pub per_source: u32,

    /// Requests per window per credential subject
    pub per_credential: u32,

    /// Default window length in seconds
    pub window_secs: u64,

    /// Per-scope window overrides
    pub global_window_secs: Option<u64>,
    pub per_source_window_secs: Option<u64>,
    pub per_credential_window_secs: Option<u64>,

    /// Counting policy for denied attempts
    pub counting: CountingPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global: DEFAULT_GLOBAL_LIMIT,
            per_source: DEFAULT_PER_SOURCE_LIMIT,
            per_credential: DEFAULT_PER_CREDENTIAL_LIMIT,
            window_secs: DEFAULT_WINDOW_SECS,
            global_window_secs: None,
            per_source_window_secs: None,
            per_credential_window_secs: None,
            counting: CountingPolicy::default(),
        }
    }
}

impl RateLimitConfig {
    /// Disable rate limiting (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Limit and window length for a scope
    pub fn limit_for(&self, scope: Scope) -> ScopeLimit {
        let (limit, window_override) = match scope {
            Scope::Global => (self.global, self.global_window_secs),
            Scope::Source => (self.per_source, self.per_source_window_secs),
            Scope::Credential => (self.per_credential, self.per_credential_window_secs),
        };
        ScopeLimit {
            limit,
            window: Duration::from_secs(window_override.unwrap_or(self.window_secs)),
        }
    }

    /// Longest window across all scopes
    pub fn max_window(&self) -> Duration {
        Scope::ALL
            .iter()
            .map(|s| self.limit_for(*s).window)
            .max()
            .unwrap_or(Duration::from_secs(self.window_secs))
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> anyhow::Result<()> {
        for scope in Scope::ALL {
            if self.limit_for(scope).window.is_zero() {
                anyhow::bail!("Rate limit window for scope '{}' must be > 0", scope);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.global, 100);
        assert_eq!(config.per_source, 20);
        assert_eq!(config.per_credential, 50);
        assert_eq!(config.counting, CountingPolicy::AllowedOnly);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_config() {
        assert!(!RateLimitConfig::disabled().enabled);
    }

    #[test]
    fn test_window_overrides() {
        let config = RateLimitConfig {
            per_source_window_secs: Some(10),
            ..Default::default()
        };
        assert_eq!(
            config.limit_for(Scope::Source).window,
            Duration::from_secs(10)
        );
        assert_eq!(
            config.limit_for(Scope::Global).window,
            Duration::from_secs(60)
        );
        assert_eq!(config.max_window(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = RateLimitConfig {
            global_window_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_counting_policy_from_toml() {
        let config: RateLimitConfig = toml::from_str(
            r#"
per_source = 5
counting = "all_attempts"
"#,
        )
        .unwrap();
        assert_eq!(config.per_source, 5);
        assert_eq!(config.global, DEFAULT_GLOBAL_LIMIT);
        assert_eq!(config.counting, CountingPolicy::AllAttempts);
    }
}
