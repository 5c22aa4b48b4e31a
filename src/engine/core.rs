// src/engine/core.rs

//! The execution engine.
//!
//! `ExecutionEngine` walks a `ScriptNode` in order and dispatches every
//! node. Commands go through the security gate and the mode selector, then
//! either run in-process (intrinsics) or as OS processes through the
//! command cache, the process pool and the executor backend.
//!
//! Ordinary failures (non-zero exit, security rejection, spawn or redirect
//! errors) are reported in-band as failed `CommandResult`s. Only the
//! conditions in [`EngineError`] abort a call.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::ast::{AssignmentNode, CommandNode, Node, PipeNode, ScriptNode};
use crate::config::ConfigFile;
use crate::config::model::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_MAX_WHILE_ITERATIONS,
    DEFAULT_POOL_IDLE_TIMEOUT, DEFAULT_POOL_MAX_SLOTS,
};
use crate::engine::cache::CommandCache;
use crate::engine::context::ExecContext;
use crate::engine::mode::{ModeDecision, ModeSelector};
use crate::engine::result::{CommandResult, ExecutionResult, Outcome, PipelineResult};
use crate::env::EnvironmentStore;
use crate::errors::EngineError;
use crate::exec::{
    ExecError, ExecutorBackend, ProcessPool, ProcessRequest, RealExecutorBackend,
    RedirectionManager,
};
use crate::security::{AllowAll, SecurityChecker, SecurityGate};
use crate::stdlib::{Intrinsic, StdLib};
use crate::types::ExecutionMode;

pub(crate) type NodesFuture<'a> = Pin<Box<dyn Future<Output = Result<Outcome, EngineError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// When false the command cache is neither read nor written.
    pub cache_enabled: bool,
    pub max_while_iterations: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_while_iterations: DEFAULT_MAX_WHILE_ITERATIONS,
        }
    }
}

/// Script runtime. One engine serves any number of `execute` calls; the
/// cache and pool persist between them.
pub struct ExecutionEngine<B: ExecutorBackend = RealExecutorBackend> {
    pub(crate) env: Arc<EnvironmentStore>,
    pub(crate) gate: Arc<dyn SecurityGate>,
    pub(crate) stdlib: StdLib,
    pub(crate) selector: ModeSelector,
    pub(crate) cache: Arc<CommandCache>,
    pub(crate) pool: ProcessPool,
    pub(crate) redirects: RedirectionManager,
    pub(crate) backend: B,
    pub(crate) options: EngineOptions,
}

impl ExecutionEngine<RealExecutorBackend> {
    pub fn builder() -> EngineBuilder<RealExecutorBackend> {
        EngineBuilder::new()
    }

    /// Engine with default cache, pool and options over the given store and
    /// gate.
    pub fn new(env: Arc<EnvironmentStore>, gate: Arc<dyn SecurityGate>) -> Self {
        Self::builder().env(env).security(gate).build()
    }
}

impl<B: ExecutorBackend> ExecutionEngine<B> {
    pub fn env(&self) -> &Arc<EnvironmentStore> {
        &self.env
    }

    pub fn cache(&self) -> &Arc<CommandCache> {
        &self.cache
    }

    pub fn pool(&self) -> &ProcessPool {
        &self.pool
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Run a whole script.
    ///
    /// Stops at the first top-level node that fails; the result then carries
    /// that node's exit code.
    pub async fn execute(
        &self,
        ctx: &ExecContext,
        script: &ScriptNode,
    ) -> Result<ExecutionResult, EngineError> {
        let start = Instant::now();
        info!(nodes = script.len(), "executing script");

        let outcome = match self.run_nodes(ctx, &script.nodes).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "script aborted");
                return Err(err);
            }
        };

        let result = outcome.into_execution_result(start.elapsed());
        info!(
            success = result.success,
            exit_code = result.exit_code,
            commands = result.command_results.len(),
            duration_ms = result.duration.as_millis() as u64,
            "script finished"
        );
        Ok(result)
    }

    /// Run a single command.
    pub async fn execute_command(
        &self,
        ctx: &ExecContext,
        cmd: &CommandNode,
    ) -> Result<CommandResult, EngineError> {
        self.run_command(ctx, cmd, None).await
    }

    /// Run a pipeline stage by stage, feeding each stage's captured output
    /// to the next one's stdin.
    pub async fn execute_pipeline(
        &self,
        ctx: &ExecContext,
        pipe: &PipeNode,
    ) -> Result<PipelineResult, EngineError> {
        let mut stages = Vec::new();
        collect_stages(&pipe.left, &mut stages)?;
        collect_stages(&pipe.right, &mut stages)?;
        debug!(stages = stages.len(), "executing pipeline");

        let mut stage_results = Vec::with_capacity(stages.len());
        let mut error = String::new();
        let mut input: Option<String> = None;

        for stage in stages {
            let result = self.run_command(ctx, stage, input.take()).await?;
            error.push_str(&result.error);

            if !result.success {
                debug!(command = %result.command, exit_code = result.exit_code, "pipeline stage failed");
                let exit_code = result.exit_code;
                let output = result.output.clone();
                stage_results.push(result);
                return Ok(PipelineResult {
                    success: false,
                    exit_code,
                    output,
                    error,
                    stage_results,
                });
            }

            input = Some(result.output.clone());
            stage_results.push(result);
        }

        Ok(PipelineResult {
            success: true,
            exit_code: 0,
            output: input.unwrap_or_default(),
            error,
            stage_results,
        })
    }

    /// Run `nodes` in order, stopping after the first failing one.
    pub(crate) fn run_nodes<'a>(&'a self, ctx: &'a ExecContext, nodes: &'a [Node]) -> NodesFuture<'a> {
        Box::pin(async move {
            let mut acc = Outcome::ok();
            for node in nodes {
                ctx.check()?;
                let unit = self.run_node(ctx, node).await?;
                let failed = !unit.success;
                acc.absorb(unit);
                if failed {
                    break;
                }
            }
            Ok(acc)
        })
    }

    async fn run_node(&self, ctx: &ExecContext, node: &Node) -> Result<Outcome, EngineError> {
        match node {
            Node::Command(cmd) => Ok(self.run_command(ctx, cmd, None).await?.into()),
            Node::Pipe(pipe) => Ok(self.execute_pipeline(ctx, pipe).await?.into()),
            Node::If(n) => self.run_if(ctx, n).await,
            Node::For(n) => self.run_for(ctx, n).await,
            Node::While(n) => self.run_while(ctx, n).await,
            Node::Assignment(n) => Ok(self.run_assignment(n)),
            Node::Redirect(_) => Err(EngineError::UnsupportedNode { kind: node.kind() }),
        }
    }

    fn run_assignment(&self, node: &AssignmentNode) -> Outcome {
        let value = self.env.expand(&node.value);
        self.env.set(node.name.as_str(), value);
        Outcome::ok()
    }

    /// Expand, vet, select a mode and run one command. `input` is piped-in
    /// text from a previous pipeline stage.
    pub(crate) async fn run_command(
        &self,
        ctx: &ExecContext,
        cmd: &CommandNode,
        input: Option<String>,
    ) -> Result<CommandResult, EngineError> {
        ctx.check()?;
        let start = Instant::now();
        let cmd = self.env.expand_command(cmd);

        if let Err(violation) = self.gate.check(&cmd) {
            let mut result =
                CommandResult::failure(cmd, None, format!("security violation: {violation}"));
            result.duration = start.elapsed();
            return Ok(result);
        }

        let decision = self.selector.decide(&cmd, &self.env);
        debug!(command = %cmd, mode = %decision.mode, "dispatching command");

        let mut result = match decision.intrinsic {
            Some(intrinsic) => self.run_interpreted(intrinsic, cmd, input),
            None => self.run_process(ctx, cmd, decision, input).await?,
        };
        result.duration = start.elapsed();

        debug!(
            command = %result.command,
            exit_code = result.exit_code,
            cached = result.cached,
            "command finished"
        );
        Ok(result)
    }

    fn run_interpreted(
        &self,
        intrinsic: Intrinsic,
        cmd: CommandNode,
        input: Option<String>,
    ) -> CommandResult {
        let mode = Some(ExecutionMode::Interpreted);
        let fs = self.stdlib.fs().as_ref();

        let plan = cmd
            .redirect
            .as_ref()
            .map(|r| self.redirects.plan(r, &self.env.working_dir()))
            .transpose();
        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => return CommandResult::failure(cmd, mode, format!("redirect error: {e}")),
        };

        let input = match &plan {
            Some(p) if p.is_input() => match self.redirects.read_input(fs, p) {
                Ok(text) => Some(text),
                Err(e) => return CommandResult::failure(cmd, mode, format!("redirect error: {e}")),
            },
            _ => input,
        };

        let output = match self.stdlib.call(intrinsic, &cmd.args, input.as_deref(), &self.env) {
            Ok(output) => output,
            Err(e) => return CommandResult::failure(cmd, mode, e.to_string()),
        };

        let output = match &plan {
            Some(p) => match self.redirects.route_output(fs, p, output) {
                Ok(rest) => rest,
                Err(e) => return CommandResult::failure(cmd, mode, format!("redirect error: {e}")),
            },
            None => output,
        };

        CommandResult {
            command: cmd,
            success: true,
            exit_code: 0,
            output: output.stdout,
            error: output.stderr,
            duration: Duration::ZERO,
            mode,
            cached: false,
        }
    }

    async fn run_process(
        &self,
        ctx: &ExecContext,
        cmd: CommandNode,
        decision: ModeDecision,
        input: Option<String>,
    ) -> Result<CommandResult, EngineError> {
        let mode = Some(decision.mode);
        let cacheable = self.options.cache_enabled && cmd.redirect.is_none() && input.is_none();

        if cacheable {
            if let Some(mut hit) = self.cache.get(&cmd.name, &cmd.args) {
                debug!(command = %cmd, "replaying cached result");
                hit.cached = true;
                return Ok(hit);
            }
        }

        let snapshot = self.env.snapshot();
        let stdio = match self
            .redirects
            .bind_process(cmd.redirect.as_ref(), &snapshot.working_dir, input)
        {
            Ok(stdio) => stdio,
            Err(e) => {
                return Ok(CommandResult::failure(cmd, mode, format!("redirect error: {e}")));
            }
        };

        let slot = tokio::select! {
            slot = self.pool.acquire(&cmd.name) => match slot {
                Ok(slot) => slot,
                Err(e) => return Ok(CommandResult::failure(cmd, mode, e.to_string())),
            },
            reason = ctx.interrupted() => return Err(reason),
        };

        let request = ProcessRequest {
            program: decision.resolved.unwrap_or_else(|| PathBuf::from(&cmd.name)),
            args: cmd.args.clone(),
            env: snapshot.vars,
            working_dir: snapshot.working_dir,
            stdio,
        };
        let outcome = self.backend.run(request, ctx).await;
        self.pool.release(slot);

        let result = match outcome {
            Ok(out) => CommandResult {
                command: cmd,
                success: out.success(),
                exit_code: out.exit_code,
                output: out.stdout,
                error: out.stderr,
                duration: Duration::ZERO,
                mode,
                cached: false,
            },
            Err(ExecError::Interrupted(reason)) => return Err(reason),
            Err(e) => {
                warn!(command = %cmd, error = %e, "process execution failed");
                CommandResult::failure(cmd, mode, e.to_string())
            }
        };

        if cacheable && result.success {
            self.cache.put(&result.command.name, &result.command.args, &result);
        }
        Ok(result)
    }
}

/// Flatten a pipe tree into its command stages, left to right.
fn collect_stages<'a>(node: &'a Node, out: &mut Vec<&'a CommandNode>) -> Result<(), EngineError> {
    match node {
        Node::Command(cmd) => out.push(cmd),
        Node::Pipe(pipe) => {
            collect_stages(&pipe.left, out)?;
            collect_stages(&pipe.right, out)?;
        }
        other => return Err(EngineError::UnsupportedNode { kind: other.kind() }),
    }
    Ok(())
}

/// Builder for [`ExecutionEngine`]. Anything not set gets the defaults:
/// process environment, `SecurityChecker`, real filesystem, a cache of 1000
/// entries for 60s and a pool of 10 slots with a 30s idle timeout.
pub struct EngineBuilder<B: ExecutorBackend = RealExecutorBackend> {
    env: Option<Arc<EnvironmentStore>>,
    gate: Option<Arc<dyn SecurityGate>>,
    stdlib: Option<StdLib>,
    cache: Option<Arc<CommandCache>>,
    pool: Option<ProcessPool>,
    backend: B,
    options: EngineOptions,
}

impl EngineBuilder<RealExecutorBackend> {
    pub fn new() -> Self {
        Self {
            env: None,
            gate: None,
            stdlib: None,
            cache: None,
            pool: None,
            backend: RealExecutorBackend,
            options: EngineOptions::default(),
        }
    }
}

impl Default for EngineBuilder<RealExecutorBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ExecutorBackend> EngineBuilder<B> {
    pub fn env(mut self, env: Arc<EnvironmentStore>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn security(mut self, gate: Arc<dyn SecurityGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn stdlib(mut self, stdlib: StdLib) -> Self {
        self.stdlib = Some(stdlib);
        self
    }

    pub fn cache(mut self, cache: Arc<CommandCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn pool(mut self, pool: ProcessPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.options.cache_enabled = enabled;
        self
    }

    pub fn max_while_iterations(mut self, limit: usize) -> Self {
        self.options.max_while_iterations = limit.max(1);
        self
    }

    /// Apply a loaded config: cache, pool, loop ceiling and security policy.
    pub fn configure(mut self, cfg: &ConfigFile) -> Self {
        self.options.cache_enabled = cfg.cache.enabled;
        self.options.max_while_iterations = cfg.engine.max_while_iterations.max(1);
        self.cache = Some(Arc::new(CommandCache::new(cfg.cache.capacity, cfg.cache.ttl)));
        self.pool = Some(ProcessPool::new(cfg.pool.max_slots, cfg.pool.idle_timeout));
        self.gate = Some(if cfg.security.enabled {
            Arc::new(SecurityChecker::from_settings(&cfg.security))
        } else {
            Arc::new(AllowAll)
        });
        self
    }

    /// Swap the process backend (tests use a fake one).
    pub fn backend<B2: ExecutorBackend>(self, backend: B2) -> EngineBuilder<B2> {
        EngineBuilder {
            env: self.env,
            gate: self.gate,
            stdlib: self.stdlib,
            cache: self.cache,
            pool: self.pool,
            backend,
            options: self.options,
        }
    }

    pub fn build(self) -> ExecutionEngine<B> {
        ExecutionEngine {
            env: self
                .env
                .unwrap_or_else(|| Arc::new(EnvironmentStore::from_process())),
            gate: self
                .gate
                .unwrap_or_else(|| Arc::new(SecurityChecker::default())),
            stdlib: self.stdlib.unwrap_or_default(),
            selector: ModeSelector,
            cache: self.cache.unwrap_or_else(|| {
                Arc::new(CommandCache::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL))
            }),
            pool: self
                .pool
                .unwrap_or_else(|| ProcessPool::new(DEFAULT_POOL_MAX_SLOTS, DEFAULT_POOL_IDLE_TIMEOUT)),
            redirects: RedirectionManager,
            backend: self.backend,
            options: self.options,
        }
    }
}
