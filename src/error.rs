//! # Error Types
//!
//! One error enum for the whole library. Tool failures are deliberately
//! absent: they are turned into text inside the tool layer and never reach
//! the graph (see `tools::web`).

use std::time::Duration;
use thiserror::Error;

/// Errors that end an analysis run (or stop it from starting).
///
/// # Rust Concept: thiserror
///
/// `#[derive(Error)]` implements `std::error::Error` and `Display` from the
/// `#[error("...")]` attributes, so callers get readable messages for free.
#[derive(Error, Debug)]
pub enum LaunchIntelError {
    /// A required credential was not configured. The graph is never built.
    #[error("System not ready: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The text-generation model failed (quota, auth, network). Fatal for the run.
    #[error("Model invocation failed: {0}")]
    Llm(String),

    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Graph exceeded its limit of {0} node executions")]
    StepLimit(usize),

    #[error("Supervisor output did not match any route: {0:?}")]
    UnrecognizedRoute(String),
}

impl LaunchIntelError {
    /// True for errors that mean "not configured", as opposed to a failed run.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, LaunchIntelError::MissingCredential(_))
    }
}

/// Shorthand used across the crate.
pub type Result<T> = std::result::Result<T, LaunchIntelError>;
