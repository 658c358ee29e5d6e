//! Static API key authentication

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AuthError, Authorizer, Credential, Identity};

/// One configured API key
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub subject: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for ApiKeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyEntry")
            .field("key", &"<redacted>")
            .field("subject", &self.subject)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Authenticates callers against a fixed set of API keys
#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuthorizer {
    keys: Vec<ApiKeyEntry>,
    allow_anonymous: bool,
}

impl ApiKeyAuthorizer {
    pub fn new(keys: Vec<ApiKeyEntry>, allow_anonymous: bool) -> Self {
        Self {
            keys,
            allow_anonymous,
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn allows_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    fn lookup(&self, presented: &str) -> Option<&ApiKeyEntry> {
        // Compare against every key so timing does not reveal the match position
        let mut found = None;
        for entry in &self.keys {
            if constant_time_eq(entry.key.as_bytes(), presented.as_bytes()) && found.is_none() {
                found = Some(entry);
            }
        }
        found
    }
}

#[async_trait]
impl Authorizer for ApiKeyAuthorizer {
    async fn authenticate(&self, credential: Option<&Credential>) -> Result<Identity, AuthError> {
        match credential {
            None if self.allow_anonymous => Ok(Identity::Anonymous),
            None => Err(AuthError::Missing),
            Some(Credential::ApiKey(key)) => match self.lookup(key) {
                Some(entry) => {
                    debug!(subject = %entry.subject, "API key accepted");
                    Ok(Identity::Subject {
                        subject: entry.subject.clone(),
                        scopes: entry.scopes.clone(),
                    })
                }
                None => {
                    warn!("Invalid API key presented");
                    Err(AuthError::Invalid)
                }
            },
            Some(Credential::Bearer(_)) => Err(AuthError::Unsupported),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
