// src/lib.rs

pub mod ast;
pub mod cli;
pub mod config;
pub mod engine;
pub mod env;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod parser;
pub mod security;
pub mod stdlib;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::ast::{CommandNode, Node, ScriptNode};
use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, load_or_default, parse_duration};
use crate::engine::{ExecContext, ExecutionEngine};
use crate::env::EnvironmentStore;
use crate::security::SecurityChecker;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - script parsing
/// - the execution engine (cache, pool, security gate)
/// - Ctrl-C handling and the optional timeout
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_or_default(args.config.as_deref()).context("loading config")?;

    let script = match &args.command {
        Command::Run { file, .. } => parser::parse_file(file)?,
        Command::Exec { command } => parser::parse_script(&command.join(" "))?,
    };

    if let Command::Run { dry_run: true, .. } = args.command {
        print_dry_run(&cfg, &script);
        return Ok(0);
    }

    let timeout = match args.timeout.as_deref() {
        Some(raw) => Some(parse_duration(raw).ok_or_else(|| anyhow!("invalid --timeout '{raw}'"))?),
        None => cfg.engine.timeout,
    };

    let mut builder = ExecutionEngine::builder()
        .env(Arc::new(EnvironmentStore::from_process()))
        .configure(&cfg);
    if args.no_cache {
        builder = builder.cache_enabled(false);
    }
    let engine = builder.build();

    let sweeper = engine.pool().spawn_idle_sweeper(sweep_period(cfg.pool.idle_timeout));

    let (mut ctx, cancel) = ExecContext::background().with_cancel();
    if let Some(timeout) = timeout {
        ctx = ctx.with_timeout(timeout);
    }

    // Ctrl-C → cancel the running script.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received, cancelling");
        cancel.cancel();
    });

    info!(nodes = script.len(), ?timeout, cache = engine.options().cache_enabled, "starting script");
    let outcome = engine.execute(&ctx, &script).await;

    engine.pool().close();
    sweeper.abort();

    match outcome {
        Ok(result) => {
            print!("{}", result.output);
            eprint!("{}", result.error);
            debug!(exit_code = result.exit_code, "script done");
            Ok(result.exit_code)
        }
        Err(err) => {
            warn!(error = %err, "script aborted");
            eprintln!("shode: {err}");
            Ok(1)
        }
    }
}

/// Sweep a few times per idle period, but not more often than once a second.
fn sweep_period(idle_timeout: Duration) -> Duration {
    (idle_timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(3600))
}

/// Dry-run output: print every node and the security verdict for each command.
fn print_dry_run(cfg: &ConfigFile, script: &ScriptNode) {
    let checker = cfg
        .security
        .enabled
        .then(|| SecurityChecker::from_settings(&cfg.security));

    println!("shode dry-run");
    println!("  engine.max_while_iterations = {}", cfg.engine.max_while_iterations);
    println!("  cache.enabled = {}", cfg.cache.enabled);
    println!("  security.enabled = {}", cfg.security.enabled);
    println!();

    println!("nodes ({}):", script.len());
    for node in &script.nodes {
        print_node(node, checker.as_ref(), 1);
    }

    debug!("dry-run complete (no execution)");
}

fn print_node(node: &Node, checker: Option<&SecurityChecker>, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Command(cmd) => print_command(cmd, checker, &indent),
        Node::Pipe(_) => {
            println!("{indent}- pipeline");
            let mut stages = Vec::new();
            pipeline_stages(node, &mut stages);
            for stage in stages {
                print_node(stage, checker, depth + 1);
            }
        }
        Node::If(n) => {
            println!("{indent}- if");
            print_node(&n.condition, checker, depth + 1);
            println!("{indent}  then:");
            for child in &n.then_body.nodes {
                print_node(child, checker, depth + 2);
            }
            if let Some(else_body) = &n.else_body {
                println!("{indent}  else:");
                for child in &else_body.nodes {
                    print_node(child, checker, depth + 2);
                }
            }
        }
        Node::For(n) => {
            println!("{indent}- for {} in {:?}", n.variable, n.items);
            for child in &n.body.nodes {
                print_node(child, checker, depth + 1);
            }
        }
        Node::While(n) => {
            println!("{indent}- while");
            print_node(&n.condition, checker, depth + 1);
            for child in &n.body.nodes {
                print_node(child, checker, depth + 1);
            }
        }
        Node::Assignment(n) => println!("{indent}- {}={}", n.name, n.value),
        Node::Redirect(r) => println!("{indent}- {r} (unsupported at top level)"),
    }
}

fn print_command(cmd: &CommandNode, checker: Option<&SecurityChecker>, indent: &str) {
    println!("{indent}- {cmd}");
    let Some(checker) = checker else {
        return;
    };
    let report = checker.report(cmd);
    match report.violation {
        Some(violation) => println!("{indent}    blocked: {violation}"),
        None => println!("{indent}    allowed"),
    }
}

fn pipeline_stages<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    match node {
        Node::Pipe(pipe) => {
            pipeline_stages(&pipe.left, out);
            pipeline_stages(&pipe.right, out);
        }
        other => out.push(other),
    }
}
