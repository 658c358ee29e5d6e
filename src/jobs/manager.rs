//! Background job manager
//!
//! Each job takes one of `max_concurrent_jobs` slots when it is submitted and
//! gives it back once its process has been reaped. A submission that finds no
//! free slot is rejected; nothing is queued.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::{Job, JobFilter, JobId, JobState, JobStats};
use crate::metrics;
use crate::tools::{CommandPlan, ExecutionOutcome, ProcessRunner};

/// Default number of jobs that may hold a slot at once
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 100;

/// Default age after which terminal jobs are evicted
pub const DEFAULT_JOB_RETENTION_SECS: u64 = 3600;

/// Job manager failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("all {capacity} execution slots are busy")]
    Busy { capacity: usize },

    #[error("job {0} not found")]
    NotFound(JobId),
}

/// What a delete call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The job was pending or running and is now cancelled
    Cancelled,
    /// Another call already cancelled the job; its process is still being reaped
    AlreadyCancelled,
    /// The job was terminal and its record has been removed
    Removed,
}

struct JobEntry {
    job: Mutex<Job>,
    cancel: CancellationToken,
    state: watch::Sender<JobState>,
    /// Worker finished and released its slot
    reaped: watch::Sender<bool>,
}

impl JobEntry {
    fn new(job: Job) -> Self {
        let (state, _) = watch::channel(job.state);
        let (reaped, _) = watch::channel(false);
        Self {
            job: Mutex::new(job),
            cancel: CancellationToken::new(),
            state,
            reaped,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Transition under the record lock and publish the new state
    fn transition(&self, job: &mut Job, next: JobState) -> bool {
        let prev = job.state;
        if !job.transition(next) {
            return false;
        }
        track_active(prev, next);
        self.state.send_replace(next);
        true
    }

    fn is_reaped(&self) -> bool {
        *self.reaped.borrow()
    }
}

fn track_active(prev: JobState, next: JobState) {
    for (state, delta) in [(prev, -1), (next, 1)] {
        if !state.is_terminal() {
            metrics::JOBS_ACTIVE
                .with_label_values(&[state.as_str()])
                .add(delta);
        }
    }
}

/// Tracks and supervises background executions
#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<JobId, Arc<JobEntry>>>>,
    slots: Arc<Semaphore>,
    capacity: usize,
    retention: Duration,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("capacity", &self.capacity)
            .field("available_slots", &self.slots.available_permits())
            .field("retention", &self.retention)
            .finish()
    }
}

impl JobManager {
    pub fn new(runner: Arc<dyn ProcessRunner>, capacity: usize, retention: Duration) -> Self {
        info!(
            "Job manager initialized: max_concurrent_jobs={}, retention={}s",
            capacity,
            retention.as_secs()
        );
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            retention,
            runner,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Take an execution slot without blocking
    ///
    /// Synchronous executions share the pool with background jobs.
    pub fn try_acquire_slot(&self) -> Result<OwnedSemaphorePermit, JobError> {
        self.slots.clone().try_acquire_owned().map_err(|_| {
            metrics::BUSY_REJECTIONS_TOTAL.inc();
            JobError::Busy {
                capacity: self.capacity,
            }
        })
    }

    /// Start a plan in the background; returns immediately
    pub async fn submit(
        &self,
        plan: CommandPlan,
        owner: &str,
        source: Option<String>,
    ) -> Result<JobId, JobError> {
        let permit = self.try_acquire_slot()?;

        let job = Job::new(plan.tool.clone(), plan.argv.clone(), owner.to_string(), source);
        let id = job.id;
        let entry = Arc::new(JobEntry::new(job));
        metrics::JOBS_ACTIVE
            .with_label_values(&[JobState::Pending.as_str()])
            .inc();

        self.jobs.write().await.insert(id, entry.clone());
        metrics::JOBS_SUBMITTED_TOTAL.inc();
        info!(job_id = %id, tool = %plan.tool, owner = %owner, "Job created");

        tokio::spawn(run_job(id, entry, plan, self.runner.clone(), permit));
        Ok(id)
    }

    /// Snapshot of one job
    pub async fn get(&self, id: JobId) -> Option<Job> {
        let entry = self.jobs.read().await.get(&id).cloned()?;
        let job = entry.lock().snapshot(Utc::now());
        Some(job)
    }

    /// Jobs matching `filter`, newest first
    pub async fn list(&self, filter: &JobFilter, limit: usize) -> Vec<Job> {
        let entries: Vec<Arc<JobEntry>> = self.jobs.read().await.values().cloned().collect();
        let now = Utc::now();
        let mut jobs: Vec<Job> = entries
            .iter()
            .map(|e| e.lock().snapshot(now))
            .filter(|job| filter.matches(job))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        jobs
    }

    /// Cancel a live job or remove a terminal one
    ///
    /// Cancelling waits until the process has been reaped. Only one caller
    /// can move a job to `cancelled`.
    pub async fn delete(&self, id: JobId) -> Result<DeleteOutcome, JobError> {
        let entry = self
            .jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))?;

        let cancelled = {
            let mut job = entry.lock();
            if job.state.is_terminal() {
                false
            } else {
                entry.transition(&mut job, JobState::Cancelled)
            }
        };

        if cancelled {
            info!(job_id = %id, "Cancelling job");
            entry.cancel.cancel();
            let mut reaped = entry.reaped.subscribe();
            // Sender lives in `entry`, so this only ends once the worker is done
            let _ = reaped.wait_for(|done| *done).await;
            return Ok(DeleteOutcome::Cancelled);
        }

        if !entry.is_reaped() {
            debug!(job_id = %id, "Job already cancelled; process still terminating");
            return Ok(DeleteOutcome::AlreadyCancelled);
        }

        self.jobs.write().await.remove(&id);
        debug!(job_id = %id, "Job record removed");
        Ok(DeleteOutcome::Removed)
    }

    /// Wait until a job reaches a terminal state
    pub async fn wait(&self, id: JobId) -> Result<Job, JobError> {
        let entry = self
            .jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))?;

        let mut state = entry.state.subscribe();
        let _ = state.wait_for(|s| s.is_terminal()).await;
        let job = entry.lock().snapshot(Utc::now());
        Ok(job)
    }

    /// Evict terminal jobs completed before `now - retention`
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        let cutoff = now.checked_sub_signed(retention);

        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| {
            let job = entry.lock();
            let stale = job.state.is_terminal()
                && entry.is_reaped()
                && matches!((job.completed_at, cutoff), (Some(done), Some(cutoff)) if done <= cutoff);
            !stale
        });
        let removed = before - jobs.len();

        if removed > 0 {
            metrics::JOBS_SWEPT_TOTAL.inc_by(removed as u64);
            info!("Swept {} expired job(s)", removed);
        }
        removed
    }

    /// Run `sweep` every `period` until `shutdown` fires
    pub fn spawn_sweeper(&self, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.sweep(Utc::now()).await;
                    }
                    _ = shutdown.cancelled() => {
                        debug!("Job sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    pub async fn stats(&self) -> JobStats {
        let entries: Vec<Arc<JobEntry>> = self.jobs.read().await.values().cloned().collect();
        let mut stats = JobStats {
            total: entries.len(),
            capacity: self.capacity,
            available_slots: self.slots.available_permits(),
            ..Default::default()
        };
        for entry in entries {
            match entry.lock().state {
                JobState::Pending => stats.pending += 1,
                JobState::Running => stats.running += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
                JobState::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Cancel every live job (shutdown)
    pub async fn cancel_all(&self) -> usize {
        let ids: Vec<JobId> = self.jobs.read().await.keys().copied().collect();
        let mut cancelled = 0;
        for id in ids {
            if let Ok(DeleteOutcome::Cancelled) = self.delete(id).await {
                cancelled += 1;
            }
        }
        cancelled
    }
}

async fn run_job(
    id: JobId,
    entry: Arc<JobEntry>,
    plan: CommandPlan,
    runner: Arc<dyn ProcessRunner>,
    permit: OwnedSemaphorePermit,
) {
    let started = {
        let mut job = entry.lock();
        entry.transition(&mut job, JobState::Running)
    };

    if started {
        info!(job_id = %id, tool = %plan.tool, "Job started");
        let outcome = runner.run(&plan, entry.cancel.clone()).await;

        let mut job = entry.lock();
        match outcome {
            Ok(result) => {
                metrics::record_execution(&result);
                match result.outcome {
                    ExecutionOutcome::Exited => {
                        entry.transition(&mut job, JobState::Completed);
                        info!(job_id = %id, "Job completed: {}", result.summary());
                    }
                    ExecutionOutcome::TimedOut => {
                        if entry.transition(&mut job, JobState::Failed) {
                            job.error = Some(format!(
                                "execution timed out after {}s",
                                plan.timeout.as_secs()
                            ));
                        }
                        warn!(job_id = %id, "Job timed out");
                    }
                    ExecutionOutcome::Cancelled => {
                        entry.transition(&mut job, JobState::Cancelled);
                        info!(job_id = %id, "Job cancelled");
                    }
                }
                job.result = Some(result);
            }
            Err(e) => {
                metrics::record_execution_error(&plan.tool);
                error!(job_id = %id, "Job failed: {}", e);
                if entry.transition(&mut job, JobState::Failed) {
                    job.error = Some("execution failed".to_string());
                }
            }
        }
    } else {
        debug!(job_id = %id, "Job cancelled before start");
    }

    drop(permit);
    entry.reaped.send_replace(true);
}
