// NetKit Orchestrator - Main Entry Point
//
// Command-line front end for the admission and execution core:
// - Tool catalog inspection
// - Target policy checks
// - Admitted execution (synchronous or as a background job)
// - Metrics endpoint

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netkit_orchestrator::admission::{Admitted, Caller, Orchestrator};
use netkit_orchestrator::auth::Credential;
use netkit_orchestrator::config::Config;
use netkit_orchestrator::jobs::{JobManager, JobState};
use netkit_orchestrator::metrics_server::{self, HealthState};
use netkit_orchestrator::target::Verdict;
use netkit_orchestrator::tools::{
    Capabilities, ExecRequest, ExecutionOutcome, ExecutionResult, TokioProcessRunner,
};
use netkit_orchestrator::{logging, metrics};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Exit status used when a command hits its timeout
const EXIT_TIMED_OUT: i32 = 124;

/// NetKit: guarded execution of network and security tools
#[derive(Parser, Debug)]
#[command(name = "netkit")]
#[command(author = "NetKit Contributors")]
#[command(version)]
#[command(about = "Admission, target validation and execution for network tools", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the tool catalog
    Tools {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one tool
    Tool {
        /// Tool name or binary
        name: String,
    },
    /// Check targets against the configured policy
    CheckTarget {
        /// Hosts, addresses or networks
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Run a tool through admission
    Exec {
        /// Tool name
        #[arg(long)]
        tool: Option<String>,

        /// Full command, or the argument string when --tool is given
        #[arg(long)]
        command: Option<String>,

        /// Argument words (requires --tool)
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        args: Option<Vec<String>>,

        /// Remote host (ssh)
        #[arg(long)]
        host: Option<String>,

        /// Remote user (ssh)
        #[arg(long)]
        user: Option<String>,

        /// Remote port (ssh)
        #[arg(long)]
        port: Option<u16>,

        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Run as a background job and wait for it
        #[arg(long = "async")]
        run_async: bool,

        /// API key to authenticate with
        #[arg(long, env = "NETKIT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
    /// Show detected runtime capabilities
    Capabilities,
    /// Serve Prometheus metrics and health
    ServeMetrics {
        /// Port (overrides the configuration)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    logging::init(&config.logging, args.verbose)?;

    match args.command {
        Some(Commands::Tools { json }) => list_tools(&config, json)?,
        Some(Commands::Tool { name }) => show_tool(&config, &name)?,
        Some(Commands::CheckTarget { targets }) => check_targets(&config, &targets)?,
        Some(Commands::Exec {
            tool,
            command,
            args,
            host,
            user,
            port,
            timeout,
            run_async,
            api_key,
            json,
        }) => {
            let request = ExecRequest {
                tool,
                command,
                args,
                host,
                user,
                port,
                timeout,
                run_async,
            };
            let credential = api_key.map(Credential::ApiKey);
            let code = exec(&config, request, credential.as_ref(), json).await?;
            std::process::exit(code);
        }
        Some(Commands::Config) => show_config(&config)?,
        Some(Commands::Capabilities) => {
            println!("{}", serde_json::to_string_pretty(&Capabilities::detect())?);
        }
        Some(Commands::ServeMetrics { port }) => serve_metrics(&config, port).await?,
        None => {
            info!("No command specified. Use \"netkit --help\" for usage.");
        }
    }

    Ok(())
}

fn list_tools(config: &Config, json: bool) -> Result<()> {
    let registry = config.registry()?;
    let infos = registry.infos(&Capabilities::detect());

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!(
        "{:<12} {:<9} {:<10} {}",
        "NAME", "CATEGORY", "STATUS", "DESCRIPTION"
    );
    for info in infos {
        let status = if !info.enabled {
            "disabled"
        } else if !info.installed {
            "missing"
        } else if !info.capability_available {
            "no-caps"
        } else {
            "ready"
        };
        println!(
            "{:<12} {:<9} {:<10} {}",
            info.name, info.category, status, info.description
        );
    }
    Ok(())
}

fn show_tool(config: &Config, name: &str) -> Result<()> {
    let registry = config.registry()?;
    let info = registry
        .info(name, &Capabilities::detect())
        .with_context(|| format!("Unknown tool: {}", name))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn check_targets(config: &Config, targets: &[String]) -> Result<()> {
    let policy = config.target_policy()?;
    let mut denied = 0;
    for target in targets {
        match policy.validate(target) {
            Verdict::Allow => println!("allow {}", target),
            Verdict::Deny(reason) => {
                denied += 1;
                println!("deny  {} ({})", target, reason);
            }
        }
    }
    if denied > 0 {
        anyhow::bail!("{} of {} target(s) denied", denied, targets.len());
    }
    Ok(())
}

/// Run one request; returns the process exit status to use
async fn exec(
    config: &Config,
    request: ExecRequest,
    credential: Option<&Credential>,
    json: bool,
) -> Result<i32> {
    metrics::init().context("Failed to initialize metrics")?;

    let capabilities = Capabilities::detect();
    let snapshot = config.resolve(capabilities)?;
    let runner = Arc::new(TokioProcessRunner::new(config.execution.runner_config()));
    let jobs = JobManager::new(
        runner.clone(),
        config.jobs.max_concurrent_jobs,
        config.jobs.retention(),
    );
    let orchestrator = Orchestrator::new(
        snapshot,
        Arc::new(config.auth.authorizer()),
        runner,
        jobs,
    );
    orchestrator.spawn_maintenance(config.jobs.sweep_interval());

    let on_interrupt = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling");
            on_interrupt.shutdown().await;
        }
    });

    let caller = Caller::new(credential, None);
    let admitted = match orchestrator.exec(request, caller).await {
        Ok(admitted) => admitted,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(2);
        }
    };

    let (result, timed_out) = match admitted {
        Admitted::Executed(result) => (result, false),
        Admitted::TimedOut(result) => (result, true),
        Admitted::Accepted { job_id } => {
            eprintln!("Job {} accepted", job_id);
            let job = orchestrator.jobs().wait(job_id).await?;
            debug!(job_id = %job_id, state = %job.state, "Job finished");
            if json {
                println!("{}", serde_json::to_string_pretty(&job)?);
                return Ok(if job.state == JobState::Completed { 0 } else { 1 });
            }
            match job.result {
                Some(result) => {
                    let timed_out = result.outcome == ExecutionOutcome::TimedOut;
                    (result, timed_out)
                }
                None => {
                    eprintln!("Error: {}", job.error.as_deref().unwrap_or("job failed"));
                    return Ok(1);
                }
            }
        }
    };

    print_result(&result, json)?;
    if timed_out {
        eprintln!("Timed out after {}ms", result.duration_ms);
        return Ok(EXIT_TIMED_OUT);
    }
    Ok(result.exit_code.unwrap_or(1))
}

fn print_result(result: &ExecutionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    if result.truncated {
        eprintln!("[output truncated]");
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let mut shown = config.clone();
    for entry in &mut shown.auth.api_keys {
        entry.key = "<redacted>".to_string();
    }
    let text = toml::to_string_pretty(&shown).context("Failed to render configuration")?;
    print!("{}", text);
    Ok(())
}

async fn serve_metrics(config: &Config, port: Option<u16>) -> Result<()> {
    let bind: IpAddr = config
        .metrics
        .bind_address
        .parse()
        .with_context(|| format!("Invalid metrics bind address: {}", config.metrics.bind_address))?;
    let port = port.unwrap_or(config.metrics.port);
    let capabilities = Capabilities::detect();
    let state = HealthState::new(&config.registry()?, capabilities);
    metrics_server::start_metrics_server(bind, port, state).await
}
