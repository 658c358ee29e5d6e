//! Background job tracking
//!
//! Jobs are held in memory only. A job owns one execution slot from
//! submission until its process is reaped; terminal records are evicted by a
//! periodic sweep once they are older than the configured retention.

mod job;
mod manager;

pub use job::{Job, JobFilter, JobId, JobState, JobStats};
pub use manager::{
    DeleteOutcome, JobError, JobManager, DEFAULT_JOB_RETENTION_SECS, DEFAULT_MAX_CONCURRENT_JOBS,
};
