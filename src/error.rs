//! Error types for Cynosure
//!
//! This module defines the error type used throughout the supervisor.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! An unmet dependency is never an error: it is reported through
//! [`CheckReport`](crate::deps::CheckReport) and drives the retry loop.

use thiserror::Error;

/// The primary error type for Cynosure operations.
#[derive(Error, Debug)]
pub enum CynoError {
    /// Configuration-related errors (invalid config, missing required fields,
    /// malformed wait expressions, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A broker instance was requested for a kind nobody registered.
    #[error("Unknown provider kind: {0}")]
    UnknownProvider(String),

    /// A requirement references a broker identity with no configured instance.
    #[error("Unconfigured broker: {0}")]
    Unconfigured(String),

    /// A requirement could not be resolved into a depender.
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// The supervised program could not be executed at all.
    #[error("Launch error: {0}")]
    Launch(String),

    /// Watch declaration errors (e.g. adding a watch after the set went live).
    #[error("Watch error: {0}")]
    Watch(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CynoError {
    /// Returns `true` if this error ends a supervisor's loop for good.
    ///
    /// Launch failures and configuration problems are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CynoError::Launch(_)
                | CynoError::Config(_)
                | CynoError::UnknownProvider(_)
                | CynoError::Unconfigured(_)
                | CynoError::Dependency(_)
        )
    }
}

/// A specialized `Result` type for Cynosure operations.
pub type Result<T> = std::result::Result<T, CynoError>;
