//! Request admission
//!
//! The [`Orchestrator`] ties authentication, rate limiting, request
//! normalization, scope checks, command building and execution together.
//! Configuration is read from an immutable [`Snapshot`] per request.

mod error;
mod orchestrator;
mod snapshot;

pub use error::AdmissionError;
pub use orchestrator::{Admitted, Caller, Orchestrator, DEFAULT_LIST_LIMIT};
pub use snapshot::{ConfigHandle, Snapshot};
