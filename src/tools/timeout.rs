//! Execution Timeout Management
//!
//! Per-tool timeout bounds and the policy applied to out-of-range requests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::builder::BuildError;

pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// What to do with a requested timeout outside a tool's bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Clamp into `[min, max]`
    #[default]
    Clamp,
    /// Reject with a validation error
    Reject,
}

/// Timeout bounds for one tool, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeoutBounds {
    pub min_secs: u64,
    pub default_secs: u64,
    pub max_secs: u64,
}

impl Default for TimeoutBounds {
    fn default() -> Self {
        Self {
            min_secs: MIN_TIMEOUT_SECS,
            default_secs: DEFAULT_TIMEOUT_SECS,
            max_secs: MAX_TIMEOUT_SECS,
        }
    }
}

impl TimeoutBounds {
    /// Default bounds with a different maximum
    pub const fn with_max(max_secs: u64) -> Self {
        Self {
            min_secs: MIN_TIMEOUT_SECS,
            default_secs: DEFAULT_TIMEOUT_SECS,
            max_secs,
        }
    }

    /// Whether `min <= default <= max` and `min > 0`
    pub fn is_consistent(&self) -> bool {
        self.min_secs > 0 && self.min_secs <= self.default_secs && self.default_secs <= self.max_secs
    }

    /// Resolve the effective timeout for a request
    pub fn resolve(
        &self,
        requested_secs: Option<u64>,
        policy: TimeoutPolicy,
    ) -> Result<Duration, BuildError> {
        let secs = match requested_secs {
            None => self.default_secs,
            Some(secs) if (self.min_secs..=self.max_secs).contains(&secs) => secs,
            Some(secs) => match policy {
                TimeoutPolicy::Clamp => secs.clamp(self.min_secs, self.max_secs),
                TimeoutPolicy::Reject => {
                    return Err(BuildError::TimeoutOutOfRange {
                        requested: secs,
                        min: self.min_secs,
                        max: self.max_secs,
                    })
                }
            },
        };
        Ok(Duration::from_secs(secs))
    }
}
