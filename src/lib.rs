//! NetKit Orchestrator Library
//!
//! Admission, safety validation and execution orchestration for a fixed
//! catalog of network and security tools: target policy checks, rate
//! limiting, argument-vector construction, process supervision and
//! background job tracking.

pub mod admission;
pub mod auth;
pub mod config;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod metrics_server;
pub mod rate_limit;
pub mod target;
pub mod tools;
