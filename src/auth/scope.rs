//! Scope checks per tool category

use std::collections::BTreeMap;

use super::{AuthError, Identity};
use crate::tools::ToolCategory;

/// Grants every scope
pub const WILDCARD_SCOPE: &str = "*";

/// Default scope for local tools
pub const EXEC_SCOPE: &str = "netkit.exec";

/// Default scope for remote execution
pub const REMOTE_SCOPE: &str = "netkit.remote";

/// Sees and cancels jobs owned by other subjects
pub const ADMIN_SCOPE: &str = "netkit.admin";

/// Maps tool categories to the scope a caller must hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeGate {
    enabled: bool,
    required: BTreeMap<ToolCategory, String>,
}

impl Default for ScopeGate {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ScopeGate {
    /// Gate that admits every identity
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            required: BTreeMap::new(),
        }
    }

    /// `netkit.remote` for remote execution, `netkit.exec` for everything else
    pub fn standard() -> Self {
        let required = ToolCategory::ALL
            .iter()
            .map(|c| {
                let scope = match c {
                    ToolCategory::Remote => REMOTE_SCOPE,
                    _ => EXEC_SCOPE,
                };
                (*c, scope.to_string())
            })
            .collect();
        Self {
            enabled: true,
            required,
        }
    }

    /// Standard gate with some categories remapped
    pub fn with_overrides(overrides: &BTreeMap<ToolCategory, String>) -> Self {
        let mut gate = Self::standard();
        for (category, scope) in overrides {
            gate.required.insert(*category, scope.clone());
        }
        gate
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn required_scope(&self, category: ToolCategory) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.required.get(&category).map(String::as_str)
    }

    /// Whether `identity` may run tools of `category`
    pub fn check(&self, identity: &Identity, category: ToolCategory) -> Result<(), AuthError> {
        match self.required_scope(category) {
            Some(scope) if !identity.has_scope(scope) => Err(AuthError::Forbidden {
                scope: scope.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Whether `identity` may see jobs it does not own
    pub fn is_admin(&self, identity: &Identity) -> bool {
        !self.enabled || identity.has_scope(ADMIN_SCOPE)
    }
}
