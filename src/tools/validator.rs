//! Argument Validation
//!
//! Structural checks on argument words. Words are never interpreted by a
//! shell, so shell metacharacters are legal content; what is rejected here is
//! what process creation or the remote login syntax cannot carry safely.

use serde::{Deserialize, Serialize};

/// Error types for argument validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("argument {0} contains a NUL byte")]
    NulByte(usize),

    #[error("too many arguments ({count}, limit {limit})")]
    TooMany { count: usize, limit: usize },

    #[error("argument {index} is too long ({len} bytes, limit {limit})")]
    TooLong {
        index: usize,
        len: usize,
        limit: usize,
    },

    #[error("{field} must not start with '-'")]
    LeadingDash { field: &'static str },

    #[error("{field} contains invalid characters")]
    InvalidCharacters { field: &'static str },

    #[error("{field} is empty")]
    Empty { field: &'static str },
}

/// Limits on the argument vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgumentLimits {
    pub max_args: usize,
    pub max_arg_len: usize,
}

impl Default for ArgumentLimits {
    fn default() -> Self {
        Self {
            max_args: 256,
            max_arg_len: 4096,
        }
    }
}

impl ArgumentLimits {
    /// Validate caller-supplied words
    pub fn check(&self, words: &[String]) -> Result<(), ArgumentError> {
        if words.len() > self.max_args {
            return Err(ArgumentError::TooMany {
                count: words.len(),
                limit: self.max_args,
            });
        }
        for (index, word) in words.iter().enumerate() {
            if word.contains('\0') {
                return Err(ArgumentError::NulByte(index));
            }
            if word.len() > self.max_arg_len {
                return Err(ArgumentError::TooLong {
                    index,
                    len: word.len(),
                    limit: self.max_arg_len,
                });
            }
        }
        Ok(())
    }
}

/// Validate a remote host for the login destination
pub fn check_remote_host(host: &str) -> Result<(), ArgumentError> {
    check_login_part(host, "host")?;
    if host.contains('@') {
        return Err(ArgumentError::InvalidCharacters { field: "host" });
    }
    Ok(())
}

/// Validate a remote user name
pub fn check_remote_user(user: &str) -> Result<(), ArgumentError> {
    check_login_part(user, "user")?;
    if user.contains('@') || user.contains(':') {
        return Err(ArgumentError::InvalidCharacters { field: "user" });
    }
    Ok(())
}

fn check_login_part(value: &str, field: &'static str) -> Result<(), ArgumentError> {
    if value.is_empty() {
        return Err(ArgumentError::Empty { field });
    }
    if value.starts_with('-') {
        return Err(ArgumentError::LeadingDash { field });
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '/')
    {
        return Err(ArgumentError::InvalidCharacters { field });
    }
    Ok(())
}
