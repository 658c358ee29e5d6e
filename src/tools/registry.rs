//! Tool Registry
//!
//! Holds the tool catalog after configuration overrides are applied. The
//! registry is immutable once built; a configuration reload builds a new one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::capabilities::{Capabilities, Capability};
use super::catalog::builtin_tools;
use super::spec::{ToolCategory, ToolSpec};
use super::timeout::TimeoutBounds;

/// Per-tool configuration overrides (`[tools.<name>]`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolOverride {
    pub enabled: Option<bool>,
    pub min_timeout: Option<u64>,
    pub default_timeout: Option<u64>,
    pub max_timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("override for unknown tool '{0}'")]
    UnknownTool(String),

    #[error("tool '{tool}' timeouts must satisfy 0 < min <= default <= max (got {min}/{default}/{max})")]
    InconsistentTimeouts {
        tool: String,
        min: u64,
        default: u64,
        max: u64,
    },
}

/// Registry of exposed tools, keyed by name
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolSpec>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolRegistry {
    /// Registry holding the built-in catalog
    pub fn builtin() -> Self {
        Self::from_specs(builtin_tools())
    }

    pub fn from_specs(specs: impl IntoIterator<Item = ToolSpec>) -> Self {
        Self {
            tools: specs.into_iter().map(|s| (s.name, s)).collect(),
        }
    }

    /// Apply configured overrides; all-or-nothing
    pub fn with_overrides(
        mut self,
        overrides: &HashMap<String, ToolOverride>,
    ) -> Result<Self, RegistryError> {
        for (name, ov) in overrides {
            let spec = self
                .tools
                .get_mut(name.as_str())
                .ok_or_else(|| RegistryError::UnknownTool(name.clone()))?;

            if let Some(enabled) = ov.enabled {
                spec.enabled = enabled;
            }
            let bounds = TimeoutBounds {
                min_secs: ov.min_timeout.unwrap_or(spec.timeouts.min_secs),
                default_secs: ov.default_timeout.unwrap_or(spec.timeouts.default_secs),
                max_secs: ov.max_timeout.unwrap_or(spec.timeouts.max_secs),
            };
            if !bounds.is_consistent() {
                return Err(RegistryError::InconsistentTimeouts {
                    tool: name.clone(),
                    min: bounds.min_secs,
                    default: bounds.default_secs,
                    max: bounds.max_secs,
                });
            }
            spec.timeouts = bounds;
        }
        Ok(self)
    }

    /// Look up by registry name, or by binary name (`testssl.sh`)
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools
            .get(name)
            .or_else(|| self.tools.values().find(|t| t.binary == name))
    }

    pub fn list(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn info(&self, name: &str, capabilities: &Capabilities) -> Option<ToolInfo> {
        self.get(name).map(|spec| ToolInfo::probe(spec, capabilities))
    }

    pub fn infos(&self, capabilities: &Capabilities) -> Vec<ToolInfo> {
        self.list()
            .map(|spec| ToolInfo::probe(spec, capabilities))
            .collect()
    }
}

/// Tool description with host availability
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub binary: &'static str,
    pub description: &'static str,
    pub category: ToolCategory,
    pub capability: Option<Capability>,
    pub timeouts: TimeoutBounds,
    pub enabled: bool,
    /// Binary found on PATH
    pub installed: bool,
    pub path: Option<PathBuf>,
    /// Required capability (if any) is held by this process
    pub capability_available: bool,
}

impl ToolInfo {
    fn probe(spec: &ToolSpec, capabilities: &Capabilities) -> Self {
        let path = find_on_path(spec.binary);
        Self {
            name: spec.name,
            binary: spec.binary,
            description: spec.description,
            category: spec.category,
            capability: spec.capability,
            timeouts: spec.timeouts,
            enabled: spec.enabled,
            installed: path.is_some(),
            path,
            capability_available: spec.capability.map_or(true, |c| capabilities.has(c)),
        }
    }

    /// Enabled, installed and runnable with current capabilities
    pub fn is_available(&self) -> bool {
        self.enabled && self.installed && self.capability_available
    }
}

/// Locate an executable on `PATH`
pub fn find_on_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = ToolRegistry::builtin();
        assert_eq!(registry.len(), 15);
        assert!(registry.get("nmap").is_some());
        assert_eq!(registry.get("testssl.sh").map(|t| t.name), Some("testssl"));
        assert!(registry.get("bash").is_none());
    }

    #[test]
    fn test_list_is_sorted() {
        let names = ToolRegistry::builtin().names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "nmap".to_string(),
            ToolOverride {
                max_timeout: Some(300),
                default_timeout: Some(120),
                ..Default::default()
            },
        );
        overrides.insert(
            "ssh".to_string(),
            ToolOverride {
                enabled: Some(false),
                ..Default::default()
            },
        );

        let registry = ToolRegistry::builtin().with_overrides(&overrides).unwrap();
        let nmap = registry.get("nmap").unwrap();
        assert_eq!(nmap.timeouts.max_secs, 300);
        assert_eq!(nmap.timeouts.default_secs, 120);
        assert!(!registry.get("ssh").unwrap().enabled);
    }

    #[test]
    fn test_override_errors() {
        let mut overrides = HashMap::new();
        overrides.insert("telnet".to_string(), ToolOverride::default());
        assert_eq!(
            ToolRegistry::builtin().with_overrides(&overrides).unwrap_err(),
            RegistryError::UnknownTool("telnet".to_string())
        );

        let mut overrides = HashMap::new();
        overrides.insert(
            "dig".to_string(),
            ToolOverride {
                max_timeout: Some(10),
                ..Default::default()
            },
        );
        assert!(matches!(
            ToolRegistry::builtin().with_overrides(&overrides),
            Err(RegistryError::InconsistentTimeouts { .. })
        ));
    }

    #[test]
    fn test_find_on_path() {
        assert!(find_on_path("sh").is_some());
        assert!(find_on_path("definitely-not-a-real-binary-xyz").is_none());
    }

    #[test]
    fn test_info_capability() {
        let registry = ToolRegistry::builtin();
        let info = registry.info("mtr", &Capabilities::none()).unwrap();
        assert!(!info.capability_available);
        assert!(!info.is_available());

        let info = registry.info("dig", &Capabilities::none()).unwrap();
        assert!(info.capability_available);
    }
}
