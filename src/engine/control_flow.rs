// src/engine/control_flow.rs

//! `if` / `for` / `while` handling for the engine.
//!
//! Conditions are plain commands: a condition holds when the command
//! succeeded with exit code 0. Condition probes are not recorded in the
//! execution result.

use tracing::{debug, warn};

use crate::ast::{CommandNode, ForNode, IfNode, Node, WhileNode};
use crate::engine::context::ExecContext;
use crate::engine::core::ExecutionEngine;
use crate::engine::result::Outcome;
use crate::errors::EngineError;
use crate::exec::ExecutorBackend;

impl<B: ExecutorBackend> ExecutionEngine<B> {
    pub(crate) async fn run_if(&self, ctx: &ExecContext, node: &IfNode) -> Result<Outcome, EngineError> {
        let condition = condition_command(&node.condition)?;
        let holds = self.evaluate_condition(ctx, condition).await?;
        debug!(condition = %condition, holds, "evaluated if condition");

        if holds {
            self.run_nodes(ctx, &node.then_body.nodes).await
        } else if let Some(else_body) = &node.else_body {
            self.run_nodes(ctx, &else_body.nodes).await
        } else {
            Ok(Outcome::ok())
        }
    }

    /// Items are expanded once, up front; the loop variable is rebound in
    /// the environment store before every body run.
    pub(crate) async fn run_for(&self, ctx: &ExecContext, node: &ForNode) -> Result<Outcome, EngineError> {
        let items: Vec<String> = node.items.iter().map(|item| self.env.expand(item)).collect();
        debug!(variable = %node.variable, items = items.len(), "entering for loop");

        let mut acc = Outcome::ok();
        for item in items {
            ctx.check()?;
            self.env.set(node.variable.as_str(), item);

            let unit = self.run_nodes(ctx, &node.body.nodes).await?;
            let failed = !unit.success;
            acc.absorb(unit);
            if failed {
                break;
            }
        }
        Ok(acc)
    }

    /// The condition is evaluated at most `max_while_iterations` times;
    /// needing one more evaluation is a fatal error.
    pub(crate) async fn run_while(&self, ctx: &ExecContext, node: &WhileNode) -> Result<Outcome, EngineError> {
        let condition = condition_command(&node.condition)?;
        let limit = self.options.max_while_iterations;

        let mut acc = Outcome::ok();
        let mut evaluations = 0usize;
        loop {
            if evaluations >= limit {
                warn!(condition = %condition, limit, "while loop hit its iteration ceiling");
                return Err(EngineError::LoopLimitExceeded { limit });
            }
            evaluations += 1;

            ctx.check()?;
            if !self.evaluate_condition(ctx, condition).await? {
                break;
            }

            let unit = self.run_nodes(ctx, &node.body.nodes).await?;
            let failed = !unit.success;
            acc.absorb(unit);
            if failed {
                break;
            }
        }

        debug!(evaluations, "while loop finished");
        Ok(acc)
    }

    async fn evaluate_condition(&self, ctx: &ExecContext, cmd: &CommandNode) -> Result<bool, EngineError> {
        let probe = self.run_command(ctx, cmd, None).await?;
        Ok(probe.success && probe.exit_code == 0)
    }
}

fn condition_command(node: &Node) -> Result<&CommandNode, EngineError> {
    match node {
        Node::Command(cmd) => Ok(cmd),
        other => Err(EngineError::UnsupportedCondition { kind: other.kind() }),
    }
}
