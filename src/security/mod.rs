// src/security/mod.rs

//! Per-command security gate.
//!
//! The engine asks a [`SecurityGate`] about every command it is about to
//! run, including each pipeline stage and each loop-body command. A
//! rejection never aborts the script: it becomes a failed command result.

mod checker;

pub use checker::{SecurityChecker, SecurityReport};

use thiserror::Error;

use crate::ast::CommandNode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityViolation {
    #[error("dangerous command blocked: {0}")]
    DangerousCommand(String),

    #[error("network administration command blocked: {0}")]
    NetworkCommand(String),

    #[error("access to sensitive path blocked: {0}")]
    SensitivePath(String),

    #[error("credentials passed on the command line: {0}")]
    CredentialInArgs(String),

    #[error("command matches deny pattern `{0}`")]
    DeniedPattern(String),
}

pub trait SecurityGate: Send + Sync + std::fmt::Debug {
    fn check(&self, cmd: &CommandNode) -> Result<(), SecurityViolation>;
}

/// Gate that accepts everything; used when `[security] enabled = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl SecurityGate for AllowAll {
    fn check(&self, _cmd: &CommandNode) -> Result<(), SecurityViolation> {
        Ok(())
    }
}
