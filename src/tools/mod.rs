//! Tool Registry and Command Building
//!
//! This module turns execution requests into validated argument vectors and
//! runs them. Nothing here ever invokes a shell.
//!
//! # Security Features
//!
//! - **Fixed Catalog**: Only tools in the registry can run
//! - **List Invocation**: Commands are executed as argument vectors
//! - **Argument Grammar**: Denied options (file output, exec modes) are refused
//! - **Target Validation**: Every host a command would contact is checked first
//! - **Timeout Enforcement**: Per-tool bounds, SIGTERM then SIGKILL
//!
//! # Architecture
//!
//! The module is organized into:
//! - `spec.rs` / `catalog.rs`: Tool descriptions and the built-in catalog
//! - `registry.rs`: Catalog plus configuration overrides
//! - `request.rs`: Request shapes and normalization
//! - `grammar.rs`: Argument analysis and target extraction
//! - `validator.rs`: Argument vector limits and remote login checks
//! - `timeout.rs`: Timeout bounds and policy
//! - `capabilities.rs`: Raw socket capability detection
//! - `builder.rs`: Request to command plan
//! - `executor.rs`: Process supervision
//!
//! # Example
//!
//! ```no_run
//! use netkit_orchestrator::auth::Identity;
//! use netkit_orchestrator::target::TargetPolicy;
//! use netkit_orchestrator::tools::{
//!     normalize, Capabilities, CommandBuilder, ExecRequest, ProcessRunner, ToolRegistry,
//!     TokioProcessRunner,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = ToolRegistry::builtin();
//!     let policy = TargetPolicy::default();
//!     let builder = CommandBuilder::new(&registry, &policy, Capabilities::detect());
//!
//!     let request = ExecRequest {
//!         command: Some("dig example.com +short".to_string()),
//!         ..Default::default()
//!     };
//!     let plan = builder.build(&normalize(request, Identity::Anonymous, None)?)?;
//!
//!     let output = TokioProcessRunner::default()
//!         .run(&plan, CancellationToken::new())
//!         .await?;
//!     println!("{}", output.stdout);
//!
//!     Ok(())
//! }
//! ```

mod builder;
mod capabilities;
pub mod catalog;
mod executor;
mod grammar;
mod registry;
mod request;
mod spec;
mod timeout;
mod validator;

pub use builder::{BuildError, CommandBuilder, CommandPlan};
pub use capabilities::{Capabilities, Capability};
pub use executor::{
    ExecError, ExecutionOutcome, ExecutionResult, ProcessRunner, RunnerConfig, TokioProcessRunner,
    DEFAULT_KILL_GRACE_SECS, DEFAULT_MAX_OUTPUT_BYTES,
};
pub use grammar::{extract_host, ArgAnalysis, GrammarError};
pub use registry::{find_on_path, RegistryError, ToolInfo, ToolOverride, ToolRegistry};
pub use request::{normalize, tokenize, ExecRequest, ExecutionRequest, RequestShape};
pub use spec::{ArgGrammar, PositionalKind, ToolCategory, ToolSpec};
pub use timeout::{
    TimeoutBounds, TimeoutPolicy, DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};
pub use validator::{check_remote_host, check_remote_user, ArgumentError, ArgumentLimits};
