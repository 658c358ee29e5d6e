//! Caller-visible admission failures

use std::time::Duration;

use crate::auth::AuthError;
use crate::jobs::JobError;
use crate::rate_limit::Scope;
use crate::target::DenyReason;
use crate::tools::{BuildError, Capability};

/// Why a request was not admitted
///
/// Messages are safe to return to callers: they never include policy
/// contents, file paths or process internals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(AuthError),

    #[error("missing required scope '{scope}'")]
    Authz { scope: String },

    #[error("rate limit exceeded for {scope} scope; retry after {}s", retry_after_secs(.retry_after))]
    RateLimited { scope: Scope, retry_after: Duration },

    #[error("target denied by {policy} policy")]
    TargetDenied { policy: DenyReason },

    #[error("tool '{tool}' requires the {capability} capability")]
    CapabilityUnavailable { tool: String, capability: Capability },

    #[error("all execution slots are busy; try again later")]
    Busy,

    #[error("not found")]
    NotFound,

    #[error("execution failed")]
    Execution,
}

fn retry_after_secs(d: &Duration) -> u64 {
    // Round up so callers never retry early
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

impl AdmissionError {
    /// Label used for decision metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionError::Validation(_) => "validation",
            AdmissionError::Auth(_) => "unauthenticated",
            AdmissionError::Authz { .. } => "forbidden",
            AdmissionError::RateLimited { .. } => "rate_limited",
            AdmissionError::TargetDenied { .. } => "target_denied",
            AdmissionError::CapabilityUnavailable { .. } => "capability_unavailable",
            AdmissionError::Busy => "busy",
            AdmissionError::NotFound => "not_found",
            AdmissionError::Execution => "error",
        }
    }

    /// HTTP status a front end should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            AdmissionError::Validation(_) => 400,
            AdmissionError::Auth(_) => 401,
            AdmissionError::Authz { .. } | AdmissionError::TargetDenied { .. } => 403,
            AdmissionError::NotFound => 404,
            AdmissionError::RateLimited { .. } => 429,
            AdmissionError::Execution => 500,
            AdmissionError::CapabilityUnavailable { .. } | AdmissionError::Busy => 503,
        }
    }

    /// Seconds a rate-limited caller should wait
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AdmissionError::RateLimited { retry_after, .. } => Some(retry_after_secs(retry_after)),
            _ => None,
        }
    }
}

impl From<BuildError> for AdmissionError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::TargetDenied { reason, .. } => {
                AdmissionError::TargetDenied { policy: reason }
            }
            BuildError::CapabilityUnavailable { tool, capability } => {
                AdmissionError::CapabilityUnavailable { tool, capability }
            }
            other => AdmissionError::Validation(other.to_string()),
        }
    }
}

impl From<AuthError> for AdmissionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden { scope } => AdmissionError::Authz { scope },
            other => AdmissionError::Auth(other),
        }
    }
}

impl From<JobError> for AdmissionError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Busy { .. } => AdmissionError::Busy,
            JobError::NotFound(_) => AdmissionError::NotFound,
        }
    }
}
