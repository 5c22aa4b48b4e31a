// src/errors.rs

//! Crate-wide error types.
//!
//! Two layers:
//! - [`EngineError`]: fatal conditions that abort an `execute` call. Ordinary
//!   command failures never show up here; they live in `CommandResult`.
//! - [`ShodeError`]: everything the CLI and config glue can fail with.

use thiserror::Error;

/// Fatal engine error: aborts the enclosing `execute` call immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unsupported node type: {kind}")]
    UnsupportedNode { kind: &'static str },

    #[error("unsupported condition node type: {kind}")]
    UnsupportedCondition { kind: &'static str },

    #[error("while loop exceeded maximum iterations ({limit})")]
    LoopLimitExceeded { limit: usize },

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Error, Debug)]
pub enum ShodeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShodeError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        ShodeError::ParseError {
            line,
            message: message.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ShodeError>;
