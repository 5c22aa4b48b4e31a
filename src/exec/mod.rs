// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`]: the `ExecutorBackend` trait, the stdio plan types and the
//!   production `RealExecutorBackend` built on `tokio::process`.
//! - [`pool`]: `ProcessPool`, the bounded set of execution slots.
//! - [`redirect`]: `RedirectionManager`, which turns a command's redirect
//!   into a stdio plan (processes) or file writes (intrinsics).

pub mod backend;
pub mod pool;
pub mod redirect;

pub use backend::{
    BackendFuture, ErrorSink, ExecError, ExecutorBackend, OutputSink, ProcessOutput, ProcessRequest,
    ProcessStdio, RealExecutorBackend, StdinSource,
};
pub use pool::{PoolError, PoolSlot, PoolStats, ProcessPool};
pub use redirect::{RedirectError, RedirectOp, RedirectPlan, RedirectionManager};
