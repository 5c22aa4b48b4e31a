// src/engine/mod.rs

//! Script execution engine.
//!
//! - [`core`]: `ExecutionEngine`, node dispatch, commands and pipelines.
//! - [`control_flow`]: `if` / `for` / `while` on top of the core.
//! - [`mode`]: `ModeSelector`, interpreted vs. process execution.
//! - [`cache`]: `CommandCache` for successful process results.
//! - [`context`]: `ExecContext`, cancellation and deadlines.
//! - [`result`]: the result types handed back to callers.

pub mod cache;
pub mod context;
pub mod control_flow;
pub mod core;
pub mod mode;
pub mod result;

pub use cache::CommandCache;
pub use context::{CancelHandle, ExecContext};
pub use core::{EngineBuilder, EngineOptions, ExecutionEngine};
pub use mode::{ModeDecision, ModeSelector};
pub use result::{CommandResult, ExecutionResult, PipelineResult};
