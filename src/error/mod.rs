//! Error module for the bubble-tea pipeline simulator.
//!
//! This module provides a comprehensive error handling framework for the
//! entire application, following Rust's idiomatic error handling patterns
//! with explicit error types, proper error propagation, and helpful context
//! information.

use thiserror::Error;

pub mod config;
pub mod queue;

/// Result type alias used throughout the pipeline simulator.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Core error enum for the pipeline simulator.
///
/// Only errors that can reach the process boundary belong here (§7 of the
/// specification): queue-full and cancellation are ordinary control flow
/// handled where they occur, not process errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Errors occurring during configuration loading or validation.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// IO errors that may occur during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Custom error with message for cases where a specific error type is not
    /// warranted.
    #[error("{0}")]
    Custom(String),
}
