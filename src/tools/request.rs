//! Request Normalization
//!
//! Callers may describe the same execution three ways:
//!
//! ```text
//! {"command": "dig example.com +short"}
//! {"tool": "dig", "args": ["example.com", "+short"]}
//! {"tool": "dig", "command": "example.com +short"}
//! ```
//!
//! [`normalize`] folds all of them into one [`ExecutionRequest`]. Raw command
//! strings are split with POSIX quoting rules and never reach a shell.

use serde::{Deserialize, Serialize};

use super::builder::BuildError;
use crate::auth::Identity;

/// Inbound execution payload, as received
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecRequest {
    pub tool: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    /// Remote host (ssh)
    pub host: Option<String>,
    /// Remote user (ssh)
    pub user: Option<String>,
    /// Remote port (ssh)
    pub port: Option<u16>,
    /// Requested timeout in seconds
    pub timeout: Option<u64>,
    #[serde(rename = "async")]
    pub run_async: bool,
}

/// Which of the accepted request shapes a payload uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestShape {
    /// Tool name and arguments in one string
    FullCommand(String),
    /// Tool name plus an argument list
    ToolArgs { tool: String, args: Vec<String> },
    /// Tool name plus an argument string
    ToolCommand { tool: String, command: String },
}

impl RequestShape {
    pub fn classify(request: &ExecRequest) -> Result<Self, BuildError> {
        let tool = request
            .tool
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match (tool, &request.args, &request.command) {
            (Some(_), Some(_), Some(_)) => Err(BuildError::Ambiguous),
            (Some(tool), Some(args), None) => Ok(RequestShape::ToolArgs {
                tool: tool.to_string(),
                args: args.clone(),
            }),
            (Some(tool), None, Some(command)) => Ok(RequestShape::ToolCommand {
                tool: tool.to_string(),
                command: command.clone(),
            }),
            (Some(tool), None, None) => Ok(RequestShape::ToolArgs {
                tool: tool.to_string(),
                args: Vec::new(),
            }),
            (None, Some(_), _) => Err(BuildError::MissingField("tool")),
            (None, None, Some(command)) => Ok(RequestShape::FullCommand(command.clone())),
            (None, None, None) => Err(BuildError::MissingField("command")),
        }
    }

    /// Tool name and argument words
    pub fn into_words(self) -> Result<(String, Vec<String>), BuildError> {
        match self {
            RequestShape::FullCommand(command) => {
                let mut words = tokenize(&command)?.into_iter();
                let tool = words.next().ok_or(BuildError::MissingField("command"))?;
                Ok((tool, words.collect()))
            }
            RequestShape::ToolArgs { tool, args } => Ok((tool, args)),
            RequestShape::ToolCommand { tool, command } => Ok((tool, tokenize(&command)?)),
        }
    }
}

/// Split a command string into words with POSIX shell quoting rules
pub fn tokenize(command: &str) -> Result<Vec<String>, BuildError> {
    shlex::split(command).ok_or(BuildError::Tokenize)
}

/// Canonical execution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub tool: String,
    /// Argument words, tool name excluded
    pub words: Vec<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub run_async: bool,
    pub identity: Identity,
    /// Caller network address, when known
    pub source: Option<String>,
}

impl ExecutionRequest {
    /// Request for `tool` with pre-split words
    pub fn new(tool: impl Into<String>, words: Vec<String>) -> Self {
        Self {
            tool: tool.into(),
            words,
            host: None,
            user: None,
            port: None,
            timeout_secs: None,
            run_async: false,
            identity: Identity::Anonymous,
            source: None,
        }
    }
}

/// Produce the canonical request for an inbound payload
pub fn normalize(
    request: ExecRequest,
    identity: Identity,
    source: Option<String>,
) -> Result<ExecutionRequest, BuildError> {
    let (tool, words) = RequestShape::classify(&request)?.into_words()?;
    Ok(ExecutionRequest {
        tool,
        words,
        host: request.host.filter(|h| !h.trim().is_empty()),
        user: request.user.filter(|u| !u.trim().is_empty()),
        port: request.port,
        timeout_secs: request.timeout,
        run_async: request.run_async,
        identity,
        source,
    })
}
