//! Admission Orchestrator
//!
//! Runs every inbound request through the same pipeline:
//!
//! ```text
//! authenticate ─► rate limit ─► normalize ─► scope check ─► build ─► run | submit
//! ```
//!
//! Each stage can reject; the first rejection is returned and recorded.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::AdmissionError;
use super::snapshot::{ConfigHandle, Snapshot};
use crate::auth::{Authorizer, Credential, Identity};
use crate::jobs::{DeleteOutcome, Job, JobFilter, JobId, JobManager, JobStats};
use crate::metrics;
use crate::rate_limit::{RateLimitDecision, RateLimitKeys, RateLimitManager, RateLimitStats};
use crate::tools::{
    normalize, ExecRequest, ExecutionOutcome, ExecutionResult, ProcessRunner, ToolInfo,
};

/// Default page size for job listings
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// An admitted request
#[derive(Debug, Clone, PartialEq)]
pub enum Admitted {
    /// Ran to completion (or was cancelled by shutdown)
    Executed(ExecutionResult),
    /// Hit its timeout; output gathered so far is included
    TimedOut(ExecutionResult),
    /// Started in the background
    Accepted { job_id: JobId },
}

/// Where a request came from
#[derive(Debug, Clone, Copy, Default)]
pub struct Caller<'a> {
    pub credential: Option<&'a Credential>,
    /// Network address of the caller
    pub source: Option<&'a str>,
}

impl<'a> Caller<'a> {
    pub fn new(credential: Option<&'a Credential>, source: Option<&'a str>) -> Self {
        Self { credential, source }
    }
}

/// Admission and execution front door
#[derive(Clone)]
pub struct Orchestrator {
    config: ConfigHandle,
    authorizer: Arc<dyn Authorizer>,
    limiter: RateLimitManager,
    runner: Arc<dyn ProcessRunner>,
    jobs: JobManager,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator; the rate limiter is built from the snapshot
    pub fn new(
        snapshot: Snapshot,
        authorizer: Arc<dyn Authorizer>,
        runner: Arc<dyn ProcessRunner>,
        jobs: JobManager,
    ) -> Self {
        let limiter = RateLimitManager::new(snapshot.rate_limit.clone());
        Self {
            config: ConfigHandle::new(snapshot),
            authorizer,
            limiter,
            runner,
            jobs,
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the rate limiter (e.g. one with a manual clock)
    pub fn with_rate_limiter(mut self, limiter: RateLimitManager) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn rate_limiter(&self) -> &RateLimitManager {
        &self.limiter
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Swap in a new configuration snapshot
    ///
    /// Counters survive; the job slot pool keeps its original size.
    pub async fn reload(&self, snapshot: Snapshot) {
        let rate_limit = snapshot.rate_limit.clone();
        self.config.replace(snapshot);
        self.limiter.update_config(rate_limit).await;
        info!("Configuration reloaded");
    }

    /// Admit and run (or submit) one request
    pub async fn exec(
        &self,
        request: ExecRequest,
        caller: Caller<'_>,
    ) -> Result<Admitted, AdmissionError> {
        let outcome = self.admit(request, caller).await;
        let decision = match &outcome {
            Ok(Admitted::Executed(_)) => "executed",
            Ok(Admitted::TimedOut(_)) => "timed_out",
            Ok(Admitted::Accepted { .. }) => "accepted",
            Err(e) => e.kind(),
        };
        metrics::ADMISSION_DECISIONS_TOTAL
            .with_label_values(&[decision])
            .inc();
        outcome
    }

    async fn admit(
        &self,
        request: ExecRequest,
        caller: Caller<'_>,
    ) -> Result<Admitted, AdmissionError> {
        let identity = self.authenticate(caller).await?;

        let keys = RateLimitKeys::new(caller.source, identity.subject_name());
        if let RateLimitDecision::Limited { scope, retry_after } = self.limiter.check(keys).await {
            metrics::RATE_LIMIT_DENIALS_TOTAL
                .with_label_values(&[scope.as_str()])
                .inc();
            warn!(
                source = caller.source.unwrap_or("-"),
                owner = identity.owner(),
                "Rate limit exceeded for {} scope",
                scope
            );
            return Err(AdmissionError::RateLimited { scope, retry_after });
        }

        let request = normalize(request, identity, caller.source.map(str::to_string))?;
        let snapshot = self.config.current();

        let spec = snapshot
            .registry
            .get(&request.tool)
            .ok_or_else(|| AdmissionError::Validation(format!("unknown tool '{}'", request.tool)))?;
        if let Err(e) = snapshot.scopes.check(&request.identity, spec.category) {
            warn!(
                owner = request.identity.owner(),
                tool = %request.tool,
                "Scope check failed: {}",
                e
            );
            return Err(e.into());
        }

        let plan = snapshot.builder().build(&request).map_err(|e| {
            let err = AdmissionError::from(e);
            if let AdmissionError::TargetDenied { policy } = &err {
                metrics::TARGET_DENIALS_TOTAL
                    .with_label_values(&[policy.as_str()])
                    .inc();
            }
            err
        })?;
        let owner = request.identity.owner();
        debug!(tool = %plan.tool, owner = owner, "Command: {}", plan.command_line());

        if request.run_async {
            let job_id = self.jobs.submit(plan, owner, request.source.clone()).await?;
            return Ok(Admitted::Accepted { job_id });
        }

        let _permit = self.jobs.try_acquire_slot()?;
        info!(tool = %plan.tool, owner = owner, "Executing");
        match self.runner.run(&plan, self.shutdown.child_token()).await {
            Ok(result) => {
                metrics::record_execution(&result);
                info!(tool = %plan.tool, "{}", result.summary());
                match result.outcome {
                    ExecutionOutcome::TimedOut => Ok(Admitted::TimedOut(result)),
                    ExecutionOutcome::Exited | ExecutionOutcome::Cancelled => {
                        Ok(Admitted::Executed(result))
                    }
                }
            }
            Err(e) => {
                metrics::record_execution_error(&plan.tool);
                error!(tool = %plan.tool, "Execution failed: {}", e);
                Err(AdmissionError::Execution)
            }
        }
    }

    async fn authenticate(&self, caller: Caller<'_>) -> Result<Identity, AdmissionError> {
        self.authorizer
            .authenticate(caller.credential)
            .await
            .map_err(|e| {
                warn!(source = caller.source.unwrap_or("-"), "Authentication failed: {}", e);
                AdmissionError::from(e)
            })
    }

    /// Whether `identity` may see `job`
    fn can_access(&self, snapshot: &Snapshot, identity: &Identity, job: &Job) -> bool {
        snapshot.scopes.is_admin(identity) || job.owner == identity.owner()
    }

    /// Look up one job; other owners' jobs read as missing
    pub async fn get_job(&self, id: JobId, caller: Caller<'_>) -> Result<Job, AdmissionError> {
        let identity = self.authenticate(caller).await?;
        let snapshot = self.config.current();
        self.jobs
            .get(id)
            .await
            .filter(|job| self.can_access(&snapshot, &identity, job))
            .ok_or(AdmissionError::NotFound)
    }

    /// List jobs, restricted to the caller's own unless they are an admin
    pub async fn list_jobs(
        &self,
        mut filter: JobFilter,
        limit: usize,
        caller: Caller<'_>,
    ) -> Result<Vec<Job>, AdmissionError> {
        let identity = self.authenticate(caller).await?;
        if !self.config.current().scopes.is_admin(&identity) {
            filter.owner = Some(identity.owner().to_string());
        }
        Ok(self.jobs.list(&filter, limit).await)
    }

    /// Cancel a live job or remove a finished one
    pub async fn delete_job(
        &self,
        id: JobId,
        caller: Caller<'_>,
    ) -> Result<DeleteOutcome, AdmissionError> {
        self.get_job(id, caller).await?;
        let outcome = self.jobs.delete(id).await?;
        info!(job_id = %id, "Delete request: {:?}", outcome);
        Ok(outcome)
    }

    pub async fn job_stats(&self) -> JobStats {
        self.jobs.stats().await
    }

    pub async fn rate_limit_stats(&self) -> RateLimitStats {
        RateLimitStats::collect(&self.limiter).await
    }

    /// Registry listing with availability on this host
    pub fn tools(&self) -> Vec<ToolInfo> {
        let snapshot = self.config.current();
        snapshot.registry.infos(&snapshot.capabilities)
    }

    /// Start the job sweeper and rate limit pruner; both stop on shutdown
    pub fn spawn_maintenance(&self, period: Duration) -> Vec<JoinHandle<()>> {
        let sweeper = self.jobs.spawn_sweeper(period, self.shutdown.child_token());

        let limiter = self.limiter.clone();
        let shutdown = self.shutdown.child_token();
        let pruner = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        limiter.prune_expired().await;
                    }
                    _ = shutdown.cancelled() => {
                        debug!("Rate limit pruner stopped");
                        break;
                    }
                }
            }
        });

        info!(period_secs = period.as_secs_f64(), "Maintenance tasks started");
        vec![sweeper, pruner]
    }

    /// Cancel synchronous runs and background jobs
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let cancelled = self.jobs.cancel_all().await;
        info!("Shutdown complete; cancelled {} job(s)", cancelled);
    }
}
