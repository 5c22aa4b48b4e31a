// src/engine/result.rs

use std::time::Duration;

use crate::ast::CommandNode;
use crate::types::ExecutionMode;

/// Outcome of one command. Built once by the engine and never mutated
/// after it is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// The command as executed, after variable expansion.
    pub command: CommandNode,
    pub success: bool,
    pub exit_code: i32,
    pub output: String,
    pub error: String,
    pub duration: Duration,
    /// `None` when the security gate rejected the command.
    pub mode: Option<ExecutionMode>,
    /// True when replayed from the command cache.
    pub cached: bool,
}

impl CommandResult {
    /// Failed result with exit code 1 and `error` as the error text.
    pub(crate) fn failure(
        command: CommandNode,
        mode: Option<ExecutionMode>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            command,
            success: false,
            exit_code: 1,
            output: String::new(),
            error: error.into(),
            duration: Duration::ZERO,
            mode,
            cached: false,
        }
    }
}

/// Aggregate of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub exit_code: i32,
    pub output: String,
    pub error: String,
    pub duration: Duration,
    /// Every command run, in execution order, including nested ones.
    pub command_results: Vec<CommandResult>,
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            success: true,
            exit_code: 0,
            output: String::new(),
            error: String::new(),
            duration: Duration::ZERO,
            command_results: Vec::new(),
        }
    }
}

/// Result of running a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub success: bool,
    pub exit_code: i32,
    /// Last stage's output on success; the failing stage's output otherwise.
    pub output: String,
    pub error: String,
    pub stage_results: Vec<CommandResult>,
}

/// Outcome of one executed unit (a command, a pipeline or a block),
/// before it is folded into an [`ExecutionResult`].
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub success: bool,
    pub exit_code: i32,
    pub output: String,
    pub error: String,
    pub results: Vec<CommandResult>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Append a later unit. The first failure decides the exit code.
    pub fn absorb(&mut self, unit: Outcome) {
        self.output.push_str(&unit.output);
        self.error.push_str(&unit.error);
        self.results.extend(unit.results);
        if self.success && !unit.success {
            self.success = false;
            self.exit_code = unit.exit_code;
        }
    }

    pub fn into_execution_result(self, duration: Duration) -> ExecutionResult {
        ExecutionResult {
            success: self.success,
            exit_code: self.exit_code,
            output: self.output,
            error: self.error,
            duration,
            command_results: self.results,
        }
    }
}

impl From<CommandResult> for Outcome {
    fn from(r: CommandResult) -> Self {
        Self {
            success: r.success,
            exit_code: r.exit_code,
            output: r.output.clone(),
            error: r.error.clone(),
            results: vec![r],
        }
    }
}

impl From<PipelineResult> for Outcome {
    fn from(p: PipelineResult) -> Self {
        Self {
            success: p.success,
            exit_code: p.exit_code,
            output: p.output,
            error: p.error,
            results: p.stage_results,
        }
    }
}
