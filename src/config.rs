// Configuration File Support
//
// TOML configuration with environment variable overrides. The first file
// found is used, in this order:
//   1. --config <path>
//   2. $NETKIT_CONFIG
//   3. ./netkit.toml
//   4. /etc/netkit/config.toml
//   5. XDG config directory: ~/.config/netkit/config.toml
//
// Environment variables (NETKIT_*) override file values. List variables are
// comma-separated and merged with the file lists; scalars replace.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::admission::Snapshot;
use crate::auth::{ApiKeyAuthorizer, ApiKeyEntry, ScopeGate, WILDCARD_SCOPE};
use crate::jobs::{DEFAULT_JOB_RETENTION_SECS, DEFAULT_MAX_CONCURRENT_JOBS};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::rate_limit::RateLimitConfig;
use crate::target::TargetPolicy;
use crate::tools::{
    ArgumentLimits, Capabilities, RunnerConfig, TimeoutPolicy, ToolCategory, ToolOverride,
    ToolRegistry, DEFAULT_KILL_GRACE_SECS, DEFAULT_MAX_OUTPUT_BYTES,
};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "NETKIT_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Scan target policy
    pub targets: TargetsConfig,

    /// Request rate limits
    pub rate_limit: RateLimitConfig,

    /// Background job limits
    pub jobs: JobsConfig,

    /// Process execution settings
    pub execution: ExecutionConfig,

    /// Authentication and scopes
    pub auth: AuthConfig,

    /// Per-tool overrides, keyed by tool name
    pub tools: HashMap<String, ToolOverride>,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// `[targets]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetsConfig {
    /// When non-empty, only these targets may be scanned
    pub whitelist: Vec<String>,

    /// Targets that may never be scanned
    pub blacklist: Vec<String>,

    /// Allow loopback, link-local and private ranges
    pub allow_private_ips: bool,
}

/// `[jobs]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobsConfig {
    /// Execution slots shared by background jobs and synchronous runs
    pub max_concurrent_jobs: usize,

    /// Seconds a finished job is kept before it may be swept
    pub job_cleanup_interval: u64,

    /// Seconds between sweeps
    pub sweep_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            job_cleanup_interval: DEFAULT_JOB_RETENTION_SECS,
            sweep_interval_secs: 60,
        }
    }
}

impl JobsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.job_cleanup_interval)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// `[execution]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// What to do with out-of-range timeouts (clamp, reject)
    pub timeout_policy: TimeoutPolicy,

    /// Captured bytes per output stream
    pub max_output_bytes: usize,

    /// Seconds between SIGTERM and SIGKILL
    pub kill_grace_period: u64,

    /// Most argument words per request
    pub max_args: usize,

    /// Longest single argument in bytes
    pub max_arg_len: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let limits = ArgumentLimits::default();
        Self {
            timeout_policy: TimeoutPolicy::default(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            kill_grace_period: DEFAULT_KILL_GRACE_SECS,
            max_args: limits.max_args,
            max_arg_len: limits.max_arg_len,
        }
    }
}

impl ExecutionConfig {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_output_bytes: self.max_output_bytes,
            kill_grace_period: Duration::from_secs(self.kill_grace_period),
        }
    }

    pub fn limits(&self) -> ArgumentLimits {
        ArgumentLimits {
            max_args: self.max_args,
            max_arg_len: self.max_arg_len,
        }
    }
}

/// `[auth]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Accept requests without credentials; unset means "only when no keys
    /// are configured"
    pub allow_anonymous: Option<bool>,

    /// Enforce per-category scopes
    pub require_scopes: bool,

    /// Static API keys
    pub api_keys: Vec<ApiKeyEntry>,

    /// Scope overrides per tool category (e.g. `scan = "netkit.scan"`)
    pub scopes: BTreeMap<String, String>,
}

impl AuthConfig {
    pub fn anonymous_allowed(&self) -> bool {
        self.allow_anonymous.unwrap_or(self.api_keys.is_empty())
    }

    pub fn authorizer(&self) -> ApiKeyAuthorizer {
        ApiKeyAuthorizer::new(self.api_keys.clone(), self.anonymous_allowed())
    }

    pub fn scope_gate(&self) -> Result<ScopeGate> {
        if !self.require_scopes {
            return Ok(ScopeGate::disabled());
        }
        let mut overrides = BTreeMap::new();
        for (name, scope) in &self.scopes {
            let category = ToolCategory::ALL
                .into_iter()
                .find(|c| c.as_str() == name.trim().to_ascii_lowercase())
                .with_context(|| format!("Unknown tool category in [auth.scopes]: {}", name))?;
            overrides.insert(category, scope.clone());
        }
        Ok(ScopeGate::with_overrides(&overrides))
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve metrics
    pub enabled: bool,

    /// Port for metrics server
    pub port: u16,

    /// Address to bind
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Find and load the configuration file
    ///
    /// An explicit path must exist; otherwise the first existing candidate is
    /// used, and defaults apply when there is none.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Self::load_from_path(path);
        }
        match Self::discover(|name| std::env::var(name).ok()) {
            Some(path) => Self::load_from_path(path),
            None => {
                tracing::debug!("No config file found, using defaults");
                let config = Self::default().apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// First existing config file among the standard locations
    pub fn discover<F>(lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut candidates = Vec::new();
        if let Some(path) = lookup(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
            candidates.push(PathBuf::from(path));
        }
        candidates.push(PathBuf::from("netkit.toml"));
        candidates.push(PathBuf::from("/etc/netkit/config.toml"));
        candidates.push(Self::config_path());

        candidates.into_iter().find(|p| p.is_file())
    }

    /// Load configuration from a specific path
    ///
    /// If the file does not exist, returns the default configuration (with
    /// environment overrides applied).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default().apply_env_overrides());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        let config = config.apply_env_overrides();
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Default per-user configuration file path
    ///
    /// Returns `~/.config/netkit/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("org", "netkit", "netkit") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("netkit")
                .join("config.toml")
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(self) -> Self {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// Recognized variables:
    /// - NETKIT_LOG_LEVEL, NETKIT_LOG_FORMAT
    /// - NETKIT_SCAN_WHITELIST, NETKIT_SCAN_BLACKLIST (lists), NETKIT_ALLOW_PRIVATE_IPS
    /// - NETKIT_RATE_LIMIT_ENABLED, NETKIT_RATE_LIMIT_GLOBAL,
    ///   NETKIT_RATE_LIMIT_PER_IP, NETKIT_RATE_LIMIT_PER_KEY, NETKIT_RATE_LIMIT_WINDOW_SECS
    /// - NETKIT_MAX_CONCURRENT_JOBS, NETKIT_JOB_CLEANUP_INTERVAL
    /// - NETKIT_TIMEOUT_POLICY, NETKIT_MAX_OUTPUT_BYTES, NETKIT_KILL_GRACE_PERIOD
    /// - NETKIT_API_KEYS (list), NETKIT_ALLOW_ANONYMOUS, NETKIT_REQUIRE_SCOPES
    /// - NETKIT_METRICS_ENABLED, NETKIT_METRICS_PORT
    ///
    /// Values that do not parse are logged and ignored.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource { lookup };

        // Logging
        if let Some(level) = env.parse::<LogLevel>("NETKIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env.parse::<LogFormat>("NETKIT_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Targets
        if let Some(list) = env.get("NETKIT_SCAN_WHITELIST") {
            merge_list(&mut self.targets.whitelist, &list);
        }
        if let Some(list) = env.get("NETKIT_SCAN_BLACKLIST") {
            merge_list(&mut self.targets.blacklist, &list);
        }
        if let Some(allow) = env.flag("NETKIT_ALLOW_PRIVATE_IPS") {
            self.targets.allow_private_ips = allow;
        }

        // Rate limits
        if let Some(enabled) = env.flag("NETKIT_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = enabled;
        }
        if let Some(limit) = env.parse("NETKIT_RATE_LIMIT_GLOBAL") {
            self.rate_limit.global = limit;
        }
        if let Some(limit) = env.parse("NETKIT_RATE_LIMIT_PER_IP") {
            self.rate_limit.per_source = limit;
        }
        if let Some(limit) = env.parse("NETKIT_RATE_LIMIT_PER_KEY") {
            self.rate_limit.per_credential = limit;
        }
        if let Some(secs) = env.parse::<u64>("NETKIT_RATE_LIMIT_WINDOW_SECS") {
            if secs > 0 {
                self.rate_limit.window_secs = secs;
            }
        }

        // Jobs
        if let Some(max) = env.parse::<usize>("NETKIT_MAX_CONCURRENT_JOBS") {
            if max > 0 {
                self.jobs.max_concurrent_jobs = max;
            }
        }
        if let Some(secs) = env.parse::<u64>("NETKIT_JOB_CLEANUP_INTERVAL") {
            if secs > 0 {
                self.jobs.job_cleanup_interval = secs;
            }
        }

        // Execution
        if let Some(raw) = env.get("NETKIT_TIMEOUT_POLICY") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "clamp" => self.execution.timeout_policy = TimeoutPolicy::Clamp,
                "reject" => self.execution.timeout_policy = TimeoutPolicy::Reject,
                _ => warn!("Ignoring invalid NETKIT_TIMEOUT_POLICY={:?}", raw),
            }
        }
        if let Some(bytes) = env.parse::<usize>("NETKIT_MAX_OUTPUT_BYTES") {
            if bytes > 0 {
                self.execution.max_output_bytes = bytes;
            }
        }
        if let Some(secs) = env.parse("NETKIT_KILL_GRACE_PERIOD") {
            self.execution.kill_grace_period = secs;
        }

        // Auth
        if let Some(list) = env.get("NETKIT_API_KEYS") {
            let mut keys: Vec<String> = Vec::new();
            merge_list(&mut keys, &list);
            for key in keys {
                if self.auth.api_keys.iter().any(|e| e.key == key) {
                    continue;
                }
                let subject = format!("api-key-{}", self.auth.api_keys.len() + 1);
                self.auth.api_keys.push(ApiKeyEntry {
                    key,
                    subject,
                    scopes: vec![WILDCARD_SCOPE.to_string()],
                });
            }
        }
        if let Some(allow) = env.flag("NETKIT_ALLOW_ANONYMOUS") {
            self.auth.allow_anonymous = Some(allow);
        }
        if let Some(require) = env.flag("NETKIT_REQUIRE_SCOPES") {
            self.auth.require_scopes = require;
        }

        // Metrics
        if let Some(enabled) = env.flag("NETKIT_METRICS_ENABLED") {
            self.metrics.enabled = enabled;
        }
        if let Some(port) = env.parse::<u16>("NETKIT_METRICS_PORT") {
            if port > 0 {
                self.metrics.port = port;
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate()?;

        // Jobs
        if self.jobs.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be > 0");
        }
        if self.jobs.job_cleanup_interval == 0 {
            anyhow::bail!("job_cleanup_interval must be > 0");
        }
        if self.jobs.sweep_interval_secs == 0 {
            anyhow::bail!("sweep_interval_secs must be > 0");
        }

        // Execution
        if self.execution.max_output_bytes == 0 {
            anyhow::bail!("max_output_bytes must be > 0");
        }
        if self.execution.max_args == 0 || self.execution.max_arg_len == 0 {
            anyhow::bail!("max_args and max_arg_len must be > 0");
        }

        // Auth
        for (i, entry) in self.auth.api_keys.iter().enumerate() {
            if entry.key.trim().is_empty() {
                anyhow::bail!("API key #{} is empty", i + 1);
            }
            if entry.subject.trim().is_empty() {
                anyhow::bail!("API key #{} has an empty subject", i + 1);
            }
            if self.auth.api_keys[..i].iter().any(|e| e.key == entry.key) {
                anyhow::bail!("API key #{} is configured more than once", i + 1);
            }
        }
        self.auth.scope_gate()?;

        // Metrics
        if self.metrics.port == 0 {
            anyhow::bail!("Metrics port must be > 0");
        }

        // Policy entries and tool overrides
        self.target_policy()?;
        self.registry()?;

        Ok(())
    }

    /// Target policy from `[targets]`
    pub fn target_policy(&self) -> Result<TargetPolicy> {
        TargetPolicy::from_entries(
            self.targets.whitelist.as_slice(),
            self.targets.blacklist.as_slice(),
            self.targets.allow_private_ips,
        )
        .context("Invalid [targets] entry")
    }

    /// Built-in registry with `[tools.<name>]` overrides applied
    pub fn registry(&self) -> Result<ToolRegistry> {
        ToolRegistry::builtin()
            .with_overrides(&self.tools)
            .context("Invalid [tools] override")
    }

    /// Produce the immutable snapshot used for admission
    pub fn resolve(&self, capabilities: Capabilities) -> Result<Snapshot> {
        Ok(Snapshot {
            registry: self.registry()?,
            policy: self.target_policy()?,
            rate_limit: self.rate_limit.clone(),
            scopes: self.auth.scope_gate()?,
            timeout_policy: self.execution.timeout_policy,
            limits: self.execution.limits(),
            capabilities,
        })
    }
}

struct EnvSource<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, name: &str) -> Option<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.get(name)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid {}={:?}: {}", name, raw, e);
                None
            }
        }
    }

    fn flag(&self, name: &str) -> Option<bool> {
        let raw = self.get(name)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => {
                warn!("Ignoring invalid {}={:?}: expected true or false", name, raw);
                None
            }
        }
    }
}

/// Append comma-separated items, keeping first occurrences in order
fn merge_list(list: &mut Vec<String>, raw: &str) {
    let incoming = raw.split(',').map(str::trim).filter(|s| !s.is_empty());
    let mut merged: Vec<String> = Vec::with_capacity(list.len());
    for item in list.iter().map(String::as_str).chain(incoming) {
        if !merged.iter().any(|m| m == item) {
            merged.push(item.to_string());
        }
    }
    *list = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::CountingPolicy;
    use crate::target::{DenyReason, Verdict};
    use tempfile::{NamedTempFile, TempDir};

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        |_| None
    }

    fn parse(toml_content: &str) -> Config {
        let config: Config = toml::from_str(toml_content).unwrap();
        config.apply_env_from(no_env())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.targets.whitelist.is_empty());
        assert!(!config.targets.allow_private_ips);
        assert_eq!(config.jobs.max_concurrent_jobs, 100);
        assert_eq!(config.jobs.job_cleanup_interval, 3600);
        assert_eq!(config.execution.timeout_policy, TimeoutPolicy::Clamp);
        assert!(config.auth.anonymous_allowed());
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_full_toml_config() {
        let config = parse(
            r#"
[logging]
level = "debug"
format = "json"

[targets]
whitelist = ["example.com", "*.example.org", "198.51.100.0/24"]
blacklist = ["203.0.113.0/24"]
allow_private_ips = true

[rate_limit]
global = 500
per_source = 10
counting = "all_attempts"

[jobs]
max_concurrent_jobs = 4
job_cleanup_interval = 600

[execution]
timeout_policy = "reject"
max_output_bytes = 65536
kill_grace_period = 2

[auth]
require_scopes = true

[[auth.api_keys]]
key = "k-alice"
subject = "alice"
scopes = ["netkit.exec"]

[auth.scopes]
scan = "netkit.scan"

[tools.nmap]
max_timeout = 600

[tools.masscan]
enabled = false

[metrics]
enabled = true
port = 9100
"#,
        );

        assert!(config.validate().is_ok());
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.targets.whitelist.len(), 3);
        assert_eq!(config.rate_limit.global, 500);
        assert_eq!(config.rate_limit.counting, CountingPolicy::AllAttempts);
        assert_eq!(config.jobs.retention(), Duration::from_secs(600));
        assert_eq!(config.execution.timeout_policy, TimeoutPolicy::Reject);
        assert_eq!(
            config.execution.runner_config().kill_grace_period,
            Duration::from_secs(2)
        );
        assert!(!config.auth.anonymous_allowed());
        assert_eq!(config.metrics.port, 9100);

        let snapshot = config.resolve(Capabilities::none()).unwrap();
        assert_eq!(snapshot.timeout_policy, TimeoutPolicy::Reject);
        assert_eq!(
            snapshot.scopes.required_scope(ToolCategory::Scan),
            Some("netkit.scan")
        );
        assert_eq!(
            snapshot.scopes.required_scope(ToolCategory::Remote),
            Some("netkit.remote")
        );
        assert_eq!(snapshot.registry.get("nmap").unwrap().timeouts.max_secs, 600);
        assert_eq!(
            snapshot.policy.validate("203.0.113.5"),
            Verdict::Deny(DenyReason::Blacklist)
        );
    }

    #[test]
    fn test_load_from_path() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[jobs]\nmax_concurrent_jobs = 7\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.jobs.max_concurrent_jobs, 7);
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_path(dir.path().join("missing.toml"));
        assert!(config.is_ok());
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(dir.path().join("missing.toml").as_path())).is_err());
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging\nlevel = \"debug\"\n").unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_unknown_tool_override_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[tools.telnet]\nenabled = true\n").unwrap();
        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("telnet"));
    }

    #[test]
    fn test_invalid_policy_entry_rejected() {
        let config = parse("[targets]\nblacklist = [\"10.0.0.0/40\"]\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_scope_category_rejected() {
        let config = parse("[auth]\nrequire_scopes = true\n[auth.scopes]\nfiles = \"x\"\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = Config::default();
        config.jobs.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.metrics.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_api_keys_rejected() {
        let config = parse(
            r#"
[[auth.api_keys]]
key = "same"
subject = "a"

[[auth.api_keys]]
key = "same"
subject = "b"
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_lists_merge_with_file() {
        let config: Config =
            toml::from_str("[targets]\nblacklist = [\"evil.example\", \"203.0.113.0/24\"]\n")
                .unwrap();
        let config = config.apply_env_from(env(&[(
            "NETKIT_SCAN_BLACKLIST",
            "203.0.113.0/24, bad.example,,evil.example",
        )]));

        assert_eq!(
            config.targets.blacklist,
            vec!["evil.example", "203.0.113.0/24", "bad.example"]
        );
    }

    #[test]
    fn test_env_scalars_override_file() {
        let config: Config =
            toml::from_str("[jobs]\nmax_concurrent_jobs = 4\n[logging]\nlevel = \"warn\"\n")
                .unwrap();
        let config = config.apply_env_from(env(&[
            ("NETKIT_MAX_CONCURRENT_JOBS", "12"),
            ("NETKIT_LOG_LEVEL", "debug"),
            ("NETKIT_ALLOW_PRIVATE_IPS", "TRUE"),
            ("NETKIT_RATE_LIMIT_PER_IP", "3"),
            ("NETKIT_TIMEOUT_POLICY", "reject"),
        ]));

        assert_eq!(config.jobs.max_concurrent_jobs, 12);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.targets.allow_private_ips);
        assert_eq!(config.rate_limit.per_source, 3);
        assert_eq!(config.execution.timeout_policy, TimeoutPolicy::Reject);
    }

    #[test]
    fn test_env_invalid_values_ignored() {
        let config = Config::default().apply_env_from(env(&[
            ("NETKIT_MAX_CONCURRENT_JOBS", "many"),
            ("NETKIT_MAX_OUTPUT_BYTES", "0"),
            ("NETKIT_LOG_LEVEL", "loud"),
            ("NETKIT_ALLOW_PRIVATE_IPS", "maybe"),
            ("NETKIT_TIMEOUT_POLICY", "sometimes"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_api_keys() {
        let config = Config::default().apply_env_from(env(&[("NETKIT_API_KEYS", "k1, k2,k1")]));
        assert_eq!(config.auth.api_keys.len(), 2);
        assert_eq!(config.auth.api_keys[0].subject, "api-key-1");
        assert_eq!(config.auth.api_keys[1].key, "k2");
        assert!(!config.auth.anonymous_allowed());

        let open = Config::default().apply_env_from(env(&[
            ("NETKIT_API_KEYS", "k1"),
            ("NETKIT_ALLOW_ANONYMOUS", "yes"),
        ]));
        assert!(open.auth.anonymous_allowed());
    }

    #[test]
    fn test_discover_prefers_env_path() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_string_lossy().to_string();
        let found = Config::discover(env(&[(CONFIG_ENV, path.as_str())]));
        assert_eq!(found, Some(temp_file.path().to_path_buf()));
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_merge_list_dedups_in_order() {
        let mut list = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        merge_list(&mut list, "c, b ,d");
        assert_eq!(list, vec!["a", "b", "c", "d"]);
    }
}
