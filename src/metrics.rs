// Prometheus metrics for the admission and execution pipeline
//
// Exposes metrics on /metrics HTTP endpoint:
// - Admission decisions by outcome (counter)
// - Rate limit denials by scope (counter)
// - Target denials by policy (counter)
// - Executions by tool and outcome (counter)
// - Execution durations (histogram)
// - Pending and running jobs (gauge)

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::tools::ExecutionResult;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Admission metrics
    pub static ref ADMISSION_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("netkit_admission_decisions_total", "Admission decisions by outcome"),
        &["decision"]
    ).expect("Failed to create admission decisions metric");

    pub static ref RATE_LIMIT_DENIALS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("netkit_rate_limit_denials_total", "Requests denied by the rate limiter"),
        &["scope"]
    ).expect("Failed to create rate limit denials metric");

    pub static ref TARGET_DENIALS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("netkit_target_denials_total", "Targets denied by the target policy"),
        &["policy"]
    ).expect("Failed to create target denials metric");

    // Execution metrics
    pub static ref EXECUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("netkit_executions_total", "Tool executions by outcome"),
        &["tool", "outcome"]
    ).expect("Failed to create executions metric");

    pub static ref EXECUTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("netkit_execution_duration_seconds", "Tool execution duration in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
        &["tool"]
    ).expect("Failed to create execution duration metric");

    // Job metrics
    pub static ref JOBS_ACTIVE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("netkit_jobs_active", "Jobs currently pending or running"),
        &["state"]
    ).expect("Failed to create active jobs metric");

    pub static ref JOBS_SUBMITTED_TOTAL: IntCounter = IntCounter::new(
        "netkit_jobs_submitted_total",
        "Total number of background jobs accepted"
    ).expect("Failed to create jobs submitted metric");

    pub static ref BUSY_REJECTIONS_TOTAL: IntCounter = IntCounter::new(
        "netkit_busy_rejections_total",
        "Requests rejected because every execution slot was taken"
    ).expect("Failed to create busy rejections metric");

    pub static ref JOBS_SWEPT_TOTAL: IntCounter = IntCounter::new(
        "netkit_jobs_swept_total",
        "Terminal job records evicted by the sweeper"
    ).expect("Failed to create jobs swept metric");

    pub static ref UPTIME_SECONDS: IntGauge = IntGauge::new(
        "netkit_uptime_seconds",
        "Seconds since the metrics server started"
    ).expect("Failed to create uptime metric");
}

/// Register all collectors; safe to call more than once
pub fn init() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ADMISSION_DECISIONS_TOTAL.clone()),
        Box::new(RATE_LIMIT_DENIALS_TOTAL.clone()),
        Box::new(TARGET_DENIALS_TOTAL.clone()),
        Box::new(EXECUTIONS_TOTAL.clone()),
        Box::new(EXECUTION_DURATION_SECONDS.clone()),
        Box::new(JOBS_ACTIVE.clone()),
        Box::new(JOBS_SUBMITTED_TOTAL.clone()),
        Box::new(BUSY_REJECTIONS_TOTAL.clone()),
        Box::new(JOBS_SWEPT_TOTAL.clone()),
        Box::new(UPTIME_SECONDS.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Record a finished execution
pub fn record_execution(result: &ExecutionResult) {
    EXECUTIONS_TOTAL
        .with_label_values(&[result.tool.as_str(), result.outcome.as_str()])
        .inc();
    EXECUTION_DURATION_SECONDS
        .with_label_values(&[result.tool.as_str()])
        .observe(result.duration_ms as f64 / 1000.0);
}

/// Record an execution that failed before producing a result
pub fn record_execution_error(tool: &str) {
    EXECUTIONS_TOTAL.with_label_values(&[tool, "error"]).inc();
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
