//! Job records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::tools::ExecutionResult;

/// Unique job identifier; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(JobId)
    }
}

/// Lifecycle state
///
/// `pending -> running -> {completed, failed}`, and `pending | running -> cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Whether moving to `next` is a legal transition
    pub fn can_become(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "cancelled" | "canceled" => Ok(JobState::Cancelled),
            other => Err(format!("unknown job state '{}'", other)),
        }
    }
}

/// Snapshot of a background job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub tool: String,
    pub command: Vec<String>,
    pub owner: String,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Time since start, up to completion or now
    pub duration_ms: Option<u64>,
    pub result: Option<ExecutionResult>,
    pub error: Option<String>,
}

impl Job {
    pub(crate) fn new(
        tool: String,
        command: Vec<String>,
        owner: String,
        source: Option<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            state: JobState::Pending,
            tool,
            command,
            owner,
            source,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            result: None,
            error: None,
        }
    }

    /// Copy with `duration_ms` filled in as of `now`
    pub(crate) fn snapshot(&self, now: DateTime<Utc>) -> Job {
        let mut job = self.clone();
        job.duration_ms = self.started_at.map(|start| {
            let end = self.completed_at.unwrap_or(now);
            (end - start).num_milliseconds().max(0) as u64
        });
        job
    }

    /// Apply a transition if legal; returns whether it happened
    pub(crate) fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_become(next) {
            return false;
        }
        let now = Utc::now();
        match next {
            JobState::Running => self.started_at = Some(now),
            _ => self.completed_at = Some(now),
        }
        self.state = next;
        true
    }
}

/// Criteria for listing jobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub state: Option<JobState>,
    pub owner: Option<String>,
    pub tool: Option<String>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.state.map_or(true, |s| s == job.state)
            && self.owner.as_deref().map_or(true, |o| o == job.owner)
            && self.tool.as_deref().map_or(true, |t| t == job.tool)
    }
}

/// Counts per state plus slot usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
    pub capacity: usize,
    pub available_slots: usize,
}
