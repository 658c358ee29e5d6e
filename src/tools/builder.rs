//! Command Builder
//!
//! Turns a canonical [`ExecutionRequest`] into a [`CommandPlan`]: a literal
//! argument vector plus its timeout, produced only after every target the
//! command would contact has passed the target policy.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::capabilities::{Capabilities, Capability};
use super::catalog::SSH_EPHEMERAL_OPTIONS;
use super::grammar::GrammarError;
use super::registry::ToolRegistry;
use super::request::ExecutionRequest;
use super::spec::{ToolCategory, ToolSpec};
use super::timeout::TimeoutPolicy;
use super::validator::{check_remote_host, check_remote_user, ArgumentError, ArgumentLimits};
use crate::target::{DenyReason, TargetPolicy, Verdict};

/// Reasons a request cannot become a command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("tool '{0}' is disabled")]
    ToolDisabled(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' is not accepted by this tool")]
    UnexpectedField(&'static str),

    #[error("request combines 'args' and 'command'; use one")]
    Ambiguous,

    #[error("command has unbalanced quotes or escapes")]
    Tokenize,

    #[error("{tool}: {source}")]
    Grammar {
        tool: String,
        #[source]
        source: GrammarError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("target '{target}' denied ({reason})")]
    TargetDenied { target: String, reason: DenyReason },

    #[error("tool '{tool}' requires the {capability} capability")]
    CapabilityUnavailable {
        tool: String,
        capability: Capability,
    },

    #[error("timeout {requested}s outside allowed range {min}..={max}s")]
    TimeoutOutOfRange { requested: u64, min: u64, max: u64 },
}

/// A validated, ready-to-run command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandPlan {
    /// Registry name of the tool
    pub tool: String,
    pub category: ToolCategory,
    /// Literal argument vector; `argv[0]` is the binary
    pub argv: Vec<String>,
    #[serde(rename = "timeout_secs", serialize_with = "serialize_secs")]
    pub timeout: Duration,
    /// Targets that passed validation
    pub targets: Vec<String>,
}

impl CommandPlan {
    /// Display form with POSIX quoting, for logs and job records
    pub fn command_line(&self) -> String {
        shlex::try_join(self.argv.iter().map(String::as_str))
            .unwrap_or_else(|_| self.argv.join(" "))
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Builds command plans against a registry and target policy
#[derive(Debug, Clone)]
pub struct CommandBuilder<'a> {
    registry: &'a ToolRegistry,
    policy: &'a TargetPolicy,
    capabilities: Capabilities,
    timeout_policy: TimeoutPolicy,
    limits: ArgumentLimits,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(
        registry: &'a ToolRegistry,
        policy: &'a TargetPolicy,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            registry,
            policy,
            capabilities,
            timeout_policy: TimeoutPolicy::default(),
            limits: ArgumentLimits::default(),
        }
    }

    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    pub fn limits(mut self, limits: ArgumentLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the command for a request
    pub fn build(&self, request: &ExecutionRequest) -> Result<CommandPlan, BuildError> {
        let spec = self
            .registry
            .get(&request.tool)
            .ok_or_else(|| BuildError::UnknownTool(request.tool.clone()))?;

        if !spec.enabled {
            return Err(BuildError::ToolDisabled(spec.name.to_string()));
        }

        self.limits.check(&request.words)?;
        let timeout = spec.timeouts.resolve(request.timeout_secs, self.timeout_policy)?;

        let (argv, targets) = if spec.remote {
            self.remote_argv(spec, request)?
        } else {
            self.local_argv(spec, request)?
        };

        let plan = CommandPlan {
            tool: spec.name.to_string(),
            category: spec.category,
            argv,
            timeout,
            targets,
        };
        debug!(tool = %plan.tool, argv = ?plan.argv, timeout_secs = timeout.as_secs(), "Built command plan");
        Ok(plan)
    }

    fn local_argv(
        &self,
        spec: &ToolSpec,
        request: &ExecutionRequest,
    ) -> Result<(Vec<String>, Vec<String>), BuildError> {
        if request.host.is_some() {
            return Err(BuildError::UnexpectedField("host"));
        }
        if request.user.is_some() {
            return Err(BuildError::UnexpectedField("user"));
        }
        if request.port.is_some() {
            return Err(BuildError::UnexpectedField("port"));
        }

        let analysis = spec
            .grammar
            .analyze(&request.words)
            .map_err(|source| BuildError::Grammar {
                tool: spec.name.to_string(),
                source,
            })?;

        if analysis.targets.is_empty() {
            return Err(BuildError::MissingField("target"));
        }
        self.check_targets(&analysis.targets)?;
        self.check_capability(spec, analysis.privileged)?;

        let mut argv = vec![spec.binary.to_string()];
        for (triggers, defaults) in spec.default_args {
            if !analysis.has_option(triggers) {
                argv.extend(defaults.iter().map(|s| s.to_string()));
            }
        }
        argv.extend(request.words.iter().cloned());
        Ok((argv, analysis.targets))
    }

    /// `ssh <fixed options> [-p PORT] [user@]host -- words`
    fn remote_argv(
        &self,
        spec: &ToolSpec,
        request: &ExecutionRequest,
    ) -> Result<(Vec<String>, Vec<String>), BuildError> {
        let grammar_err = |source: GrammarError| BuildError::Grammar {
            tool: spec.name.to_string(),
            source,
        };

        let mut words = request.words.iter().peekable();
        let mut port = None;
        let mut user = None;

        // Only -p and -l are accepted ahead of the destination
        while let Some(word) = words.next_if(|w| w.starts_with('-')) {
            match word.as_str() {
                "--" => break,
                "-p" => {
                    let value = words
                        .next()
                        .ok_or_else(|| grammar_err(GrammarError::MissingValue("-p".into())))?;
                    port = Some(parse_port(value)?);
                }
                "-l" => {
                    let value = words
                        .next()
                        .ok_or_else(|| grammar_err(GrammarError::MissingValue("-l".into())))?;
                    user = Some(value.clone());
                }
                other => return Err(grammar_err(GrammarError::DeniedOption(other.to_string()))),
            }
        }

        let (host, dest_user) = match &request.host {
            Some(host) => (host.clone(), None),
            None => {
                let dest = words.next().ok_or(BuildError::MissingField("host"))?;
                match dest.rsplit_once('@') {
                    Some((u, h)) => (h.to_string(), Some(u.to_string())),
                    None => (dest.clone(), None),
                }
            }
        };

        let user = match (request.user.clone(), dest_user, user) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => {
                return Err(BuildError::Ambiguous)
            }
            (a, b, c) => a.or(b).or(c),
        };
        let port = match (request.port, port) {
            (Some(_), Some(_)) => return Err(BuildError::Ambiguous),
            (a, b) => a.or(b),
        };

        let command: Vec<String> = words.cloned().collect();
        if command.is_empty() {
            return Err(BuildError::MissingField("command"));
        }

        check_remote_host(&host)?;
        if let Some(user) = &user {
            check_remote_user(user)?;
        }
        self.check_targets(std::slice::from_ref(&host))?;
        self.check_capability(spec, false)?;

        let mut argv = vec![spec.binary.to_string()];
        argv.extend(SSH_EPHEMERAL_OPTIONS.iter().map(|s| s.to_string()));
        if let Some(port) = port {
            argv.push("-p".to_string());
            argv.push(port.to_string());
        }
        argv.push(match &user {
            Some(user) => format!("{}@{}", user, host),
            None => host.clone(),
        });
        argv.push("--".to_string());
        argv.extend(command);
        Ok((argv, vec![host]))
    }

    fn check_targets(&self, targets: &[String]) -> Result<(), BuildError> {
        for target in targets {
            if let Verdict::Deny(reason) = self.policy.validate(target) {
                warn!(target = %target, reason = %reason, "Target denied");
                return Err(BuildError::TargetDenied {
                    target: target.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    fn check_capability(&self, spec: &ToolSpec, privileged: bool) -> Result<(), BuildError> {
        match spec.required_capability(privileged) {
            Some(capability) if !self.capabilities.has(capability) => {
                Err(BuildError::CapabilityUnavailable {
                    tool: spec.name.to_string(),
                    capability,
                })
            }
            _ => Ok(()),
        }
    }
}

fn parse_port(value: &str) -> Result<u16, BuildError> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(BuildError::InvalidPort(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::tools::catalog::builtin_tools;
    use crate::tools::request::{normalize, ExecRequest};
    use crate::tools::spec::PositionalKind;

    fn registry() -> ToolRegistry {
        ToolRegistry::builtin()
    }

    fn policy() -> TargetPolicy {
        TargetPolicy::from_entries(&[] as &[&str], &["203.0.113.0/24", "*.evil.example"], false)
            .unwrap()
    }

    fn request(tool: &str, words: &[&str]) -> ExecutionRequest {
        ExecutionRequest::new(tool, words.iter().map(|s| s.to_string()).collect())
    }

    fn build(req: &ExecutionRequest) -> Result<CommandPlan, BuildError> {
        let registry = registry();
        let policy = policy();
        CommandBuilder::new(&registry, &policy, Capabilities::none()).build(req)
    }

    #[test]
    fn test_equivalent_shapes_give_same_argv() {
        let registry = registry();
        let policy = policy();
        let builder = CommandBuilder::new(&registry, &policy, Capabilities::none());

        let shapes = [
            r#"{"command": "dig example.com +short"}"#,
            r#"{"tool": "dig", "args": ["example.com", "+short"]}"#,
            r#"{"tool": "dig", "command": "example.com +short"}"#,
        ];
        for json in shapes {
            let req: ExecRequest = serde_json::from_str(json).unwrap();
            let canonical = normalize(req, Identity::Anonymous, None).unwrap();
            let plan = builder.build(&canonical).unwrap();
            assert_eq!(plan.argv, vec!["dig", "example.com", "+short"]);
            assert_eq!(plan.timeout, Duration::from_secs(60));
        }
    }

    #[test]
    fn test_unknown_tool() {
        assert_eq!(
            build(&request("telnet", &["example.com"])),
            Err(BuildError::UnknownTool("telnet".to_string()))
        );
    }

    #[test]
    fn test_missing_target() {
        assert_eq!(
            build(&request("nmap", &["-sT", "-p", "80"])),
            Err(BuildError::MissingField("target"))
        );
    }

    #[test]
    fn test_target_denied() {
        assert_eq!(
            build(&request("ping", &["203.0.113.9"])),
            Err(BuildError::TargetDenied {
                target: "203.0.113.9".to_string(),
                reason: DenyReason::Blacklist
            })
        );
        assert!(matches!(
            build(&request("curl", &["http://127.0.0.1:8080/admin"])),
            Err(BuildError::TargetDenied {
                reason: DenyReason::PrivateAddress,
                ..
            })
        ));
        assert!(matches!(
            build(&request("dig", &["example.com", "@10.0.0.53"])),
            Err(BuildError::TargetDenied {
                reason: DenyReason::PrivateAddress,
                ..
            })
        ));
    }

    #[test]
    fn test_every_target_checked() {
        assert!(matches!(
            build(&request("nmap", &["scanme.nmap.org", "www.evil.example"])),
            Err(BuildError::TargetDenied {
                reason: DenyReason::Blacklist,
                ..
            })
        ));
    }

    #[test]
    fn test_denied_option() {
        assert!(matches!(
            build(&request("nmap", &["-oN", "/tmp/scan", "scanme.nmap.org"])),
            Err(BuildError::Grammar {
                source: GrammarError::DeniedOption(_),
                ..
            })
        ));
    }

    #[test]
    fn test_capability_required() {
        assert_eq!(
            build(&request("traceroute", &["example.com"])),
            Err(BuildError::CapabilityUnavailable {
                tool: "traceroute".to_string(),
                capability: Capability::NetRaw
            })
        );
        assert!(matches!(
            build(&request("nmap", &["-sS", "scanme.nmap.org"])),
            Err(BuildError::CapabilityUnavailable { .. })
        ));
        assert!(build(&request("nmap", &["-sT", "scanme.nmap.org"])).is_ok());

        let registry = registry();
        let policy = policy();
        let privileged = CommandBuilder::new(&registry, &policy, Capabilities::all());
        assert!(privileged
            .build(&request("nmap", &["-sS", "scanme.nmap.org"]))
            .is_ok());
    }

    #[test]
    fn test_default_args() {
        let plan = build(&request("ping", &["example.com"])).unwrap();
        assert_eq!(plan.argv, vec!["ping", "-c", "4", "example.com"]);

        let plan = build(&request("ping", &["-c", "2", "example.com"])).unwrap();
        assert_eq!(plan.argv, vec!["ping", "-c", "2", "example.com"]);
    }

    #[test]
    fn test_binary_name_lookup() {
        let plan = build(&request("testssl.sh", &["example.com:443"])).unwrap();
        assert_eq!(plan.tool, "testssl");
        assert_eq!(plan.argv[0], "testssl.sh");
        assert_eq!(plan.targets, vec!["example.com"]);
    }

    #[test]
    fn test_timeout_policy() {
        let registry = registry();
        let policy = policy();
        let mut req = request("dig", &["example.com"]);
        req.timeout_secs = Some(99_999);

        let clamp = CommandBuilder::new(&registry, &policy, Capabilities::none());
        assert_eq!(clamp.build(&req).unwrap().timeout, Duration::from_secs(3600));

        let reject = clamp.clone().timeout_policy(TimeoutPolicy::Reject);
        assert!(matches!(
            reject.build(&req),
            Err(BuildError::TimeoutOutOfRange { requested: 99_999, .. })
        ));
    }

    #[test]
    fn test_host_field_rejected_for_local_tools() {
        let mut req = request("dig", &["example.com"]);
        req.host = Some("example.org".to_string());
        assert_eq!(build(&req), Err(BuildError::UnexpectedField("host")));
    }

    #[test]
    fn test_shell_metacharacters_are_literal_words() {
        let plan = build(&request(
            "curl",
            &["-H", "X: $(reboot); `id` | nc", "https://example.com"],
        ))
        .unwrap();
        assert_eq!(plan.argv[2], "X: $(reboot); `id` | nc");
        assert_eq!(plan.argv.len(), 4);
    }

    #[test]
    fn test_ssh_argv_shape() {
        let mut req = request("ssh", &["uptime", "-a"]);
        req.host = Some("srv.example.com".to_string());
        req.user = Some("deploy".to_string());
        req.port = Some(2222);

        let plan = build(&req).unwrap();
        let mut expected = vec!["ssh".to_string()];
        expected.extend(SSH_EPHEMERAL_OPTIONS.iter().map(|s| s.to_string()));
        expected.extend(
            ["-p", "2222", "deploy@srv.example.com", "--", "uptime", "-a"]
                .iter()
                .map(|s| s.to_string()),
        );
        assert_eq!(plan.argv, expected);
        assert_eq!(plan.targets, vec!["srv.example.com"]);
    }

    #[test]
    fn test_ssh_destination_from_words() {
        let plan = build(&request("ssh", &["-p", "22", "ops@srv.example.com", "df", "-h"])).unwrap();
        let tail: Vec<_> = plan.argv.iter().rev().take(5).rev().cloned().collect();
        assert_eq!(tail, vec!["22", "ops@srv.example.com", "--", "df", "-h"]);
    }

    #[test]
    fn test_ssh_rejects_option_injection() {
        assert!(matches!(
            build(&request("ssh", &["-oProxyCommand=id", "srv.example.com", "true"])),
            Err(BuildError::Grammar {
                source: GrammarError::DeniedOption(_),
                ..
            })
        ));

        let mut req = request("ssh", &["true"]);
        req.host = Some("-oProxyCommand=id".to_string());
        assert!(matches!(
            build(&req),
            Err(BuildError::InvalidArgument(ArgumentError::LeadingDash { field: "host" }))
        ));

        let mut req = request("ssh", &["true"]);
        req.host = Some("srv.example.com".to_string());
        req.user = Some("-l".to_string());
        assert!(matches!(build(&req), Err(BuildError::InvalidArgument(_))));
    }

    #[test]
    fn test_ssh_requires_host_and_command() {
        assert_eq!(
            build(&request("ssh", &[])),
            Err(BuildError::MissingField("host"))
        );
        assert_eq!(
            build(&request("ssh", &["srv.example.com"])),
            Err(BuildError::MissingField("command"))
        );
    }

    #[test]
    fn test_ssh_private_host_denied() {
        assert!(matches!(
            build(&request("ssh", &["root@192.168.1.10", "id"])),
            Err(BuildError::TargetDenied {
                reason: DenyReason::PrivateAddress,
                ..
            })
        ));
    }

    #[test]
    fn test_bare_number_target_denied() {
        for (tool, words) in [
            ("curl", &["https://example.com", "0"][..]),
            ("nmap", &["-sT", "scanme.nmap.org", "0"][..]),
            ("ping", &["80"][..]),
        ] {
            assert!(
                matches!(
                    build(&request(tool, words)),
                    Err(BuildError::TargetDenied {
                        reason: DenyReason::Malformed,
                        ..
                    })
                ),
                "{} {:?}",
                tool,
                words
            );
        }

        let registry = registry();
        let policy = policy();
        let builder = CommandBuilder::new(&registry, &policy, Capabilities::all());
        let plan = builder
            .build(&request("nc", &["-zv", "example.com", "80", "443"]))
            .unwrap();
        assert_eq!(plan.targets, vec!["example.com"]);
    }

    #[test]
    fn test_nmap_dns_servers_checked() {
        assert_eq!(
            build(&request("nmap", &["-sT", "--dns-servers", "10.0.0.53", "scanme.nmap.org"])),
            Err(BuildError::TargetDenied {
                target: "10.0.0.53".to_string(),
                reason: DenyReason::PrivateAddress
            })
        );
        let plan = build(&request(
            "nmap",
            &["-sT", "--dns-servers=9.9.9.9,1.1.1.1", "scanme.nmap.org"],
        ))
        .unwrap();
        assert_eq!(plan.targets, vec!["9.9.9.9", "1.1.1.1", "scanme.nmap.org"]);
    }

    #[test]
    fn test_nmap_script_and_inline_values_rejected() {
        assert!(matches!(
            build(&request("nmap", &["--script", "broadcast-dhcp-discover"])),
            Err(BuildError::Grammar {
                source: GrammarError::DeniedOption(_),
                ..
            })
        ));
        assert_eq!(
            build(&request("nmap", &["-sT", "--foo=10.0.0.1", "scanme.nmap.org"])),
            Err(BuildError::Grammar {
                tool: "nmap".to_string(),
                source: GrammarError::InlineValue("--foo".to_string())
            })
        );
    }

    #[test]
    fn test_every_catalog_tool_builds() {
        let registry = registry();
        let policy = policy();
        let builder = CommandBuilder::new(&registry, &policy, Capabilities::all());

        for spec in builtin_tools() {
            let mut req = match spec.grammar.positional {
                PositionalKind::Url => request(spec.name, &["https://example.com"]),
                PositionalKind::Host => request(spec.name, &["example.com"]),
            };
            if spec.remote {
                req.words.push("uptime".to_string());
            }
            let plan = builder
                .build(&req)
                .unwrap_or_else(|e| panic!("{} failed to build: {}", spec.name, e));
            assert_eq!(plan.argv[0], spec.binary, "{}", spec.name);
            assert_eq!(plan.targets, vec!["example.com"], "{}", spec.name);
            assert_eq!(plan.argv.last().map(String::as_str), req.words.last().map(String::as_str));
        }
    }

    #[test]
    fn test_command_line_quoting() {
        let plan = build(&request("curl", &["-A", "my agent", "https://example.com"])).unwrap();
        let line = plan.command_line();
        assert!(line.starts_with("curl -A "));
        assert_eq!(shlex::split(&line).unwrap(), plan.argv);
    }
}
