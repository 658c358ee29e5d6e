//! Caller Authentication and Authorization
//!
//! Turns a presented credential into an [`Identity`] and decides whether that
//! identity may use a tool category.
//!
//! # Architecture
//!
//! ```text
//! Credential ──► Authorizer::authenticate ──► Identity
//!                                                │
//!                          ToolCategory ──► ScopeGate::check ──► allow / Forbidden
//! ```
//!
//! Bearer token verification (OIDC, JWT signatures) lives outside this crate;
//! an implementation of [`Authorizer`] can be plugged in for it.

mod api_key;
mod scope;

pub use api_key::{ApiKeyAuthorizer, ApiKeyEntry};
pub use scope::{ScopeGate, ADMIN_SCOPE, EXEC_SCOPE, REMOTE_SCOPE, WILDCARD_SCOPE};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Name recorded as the owner of anonymous jobs
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// A credential presented by a caller
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    Bearer(String),
}

impl Credential {
    /// Extract a credential from request headers
    ///
    /// `X-API-Key` wins; otherwise `Authorization: ApiKey <key>` or
    /// `Authorization: Bearer <token>`.
    pub fn from_headers(x_api_key: Option<&str>, authorization: Option<&str>) -> Option<Self> {
        if let Some(key) = x_api_key.map(str::trim).filter(|k| !k.is_empty()) {
            return Some(Credential::ApiKey(key.to_string()));
        }
        let (scheme, value) = authorization?.trim().split_once(' ')?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if scheme.eq_ignore_ascii_case("apikey") {
            Some(Credential::ApiKey(value.to_string()))
        } else if scheme.eq_ignore_ascii_case("bearer") {
            Some(Credential::Bearer(value.to_string()))
        } else {
            None
        }
    }
}

// Never print secrets
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Who is making a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    Anonymous,
    Subject { subject: String, scopes: Vec<String> },
}

impl Identity {
    pub fn subject(name: impl Into<String>, scopes: &[&str]) -> Self {
        Identity::Subject {
            subject: name.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Subject name, if authenticated
    pub fn subject_name(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Subject { subject, .. } => Some(subject.as_str()),
        }
    }

    /// Owner recorded on jobs
    pub fn owner(&self) -> &str {
        self.subject_name().unwrap_or(ANONYMOUS_OWNER)
    }

    /// Granted scopes; anonymous identities have none
    pub fn scopes(&self) -> &[String] {
        match self {
            Identity::Anonymous => &[],
            Identity::Subject { scopes, .. } => scopes.as_slice(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes()
            .iter()
            .any(|s| s == scope || s == WILDCARD_SCOPE)
    }
}

/// Authentication and authorization failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,

    #[error("invalid credentials")]
    Invalid,

    #[error("credential type not supported")]
    Unsupported,

    #[error("missing required scope '{scope}'")]
    Forbidden { scope: String },
}

/// Resolves credentials into identities
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authenticate(&self, credential: Option<&Credential>) -> Result<Identity, AuthError>;
}

/// Accepts every caller as anonymous
#[derive(Debug, Clone, Default)]
pub struct AllowAnonymous;

#[async_trait]
impl Authorizer for AllowAnonymous {
    async fn authenticate(&self, _credential: Option<&Credential>) -> Result<Identity, AuthError> {
        Ok(Identity::Anonymous)
    }
}
