// src/exec/backend.rs

//! Pluggable process runner.
//!
//! The engine talks to an `ExecutorBackend` instead of `tokio::process`
//! directly, so tests can swap in a fake that records requests and replays
//! scripted output without spawning anything.

use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::ExecContext;
use crate::errors::EngineError;

/// Where a child's stdin comes from.
#[derive(Debug)]
pub enum StdinSource {
    Null,
    /// Buffered text, e.g. the previous pipeline stage's output.
    Text(String),
    File(File),
}

#[derive(Debug)]
pub enum OutputSink {
    Capture,
    File(File),
}

#[derive(Debug)]
pub enum ErrorSink {
    Capture,
    File(File),
    /// Follow stdout. With captured stdout, stderr text is appended after it.
    MergeWithStdout,
}

/// Stdio plan for one child. Owns every file handle it refers to, so the
/// handles are closed whenever the plan is dropped, spawned or not.
#[derive(Debug)]
pub struct ProcessStdio {
    pub stdin: StdinSource,
    pub stdout: OutputSink,
    pub stderr: ErrorSink,
}

impl Default for ProcessStdio {
    fn default() -> Self {
        Self {
            stdin: StdinSource::Null,
            stdout: OutputSink::Capture,
            stderr: ErrorSink::Capture,
        }
    }
}

#[derive(Debug)]
pub struct ProcessRequest {
    /// Resolved program path.
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Complete child environment; nothing is inherited from the host.
    pub env: HashMap<String, String>,
    pub working_dir: PathBuf,
    pub stdio: ProcessStdio,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Interrupted(#[from] EngineError),
}

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<ProcessOutput, ExecError>> + Send + 'a>>;

/// Trait abstracting how external programs are run.
pub trait ExecutorBackend: Send + Sync {
    /// Run one program to completion.
    ///
    /// Must stop the child and return [`ExecError::Interrupted`] once `ctx`
    /// is cancelled or past its deadline.
    fn run<'a>(&'a self, request: ProcessRequest, ctx: &'a ExecContext) -> BackendFuture<'a>;
}

/// Spawns real OS processes through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealExecutorBackend;

impl ExecutorBackend for RealExecutorBackend {
    fn run<'a>(&'a self, request: ProcessRequest, ctx: &'a ExecContext) -> BackendFuture<'a> {
        Box::pin(run_process(request, ctx))
    }
}

async fn run_process(request: ProcessRequest, ctx: &ExecContext) -> Result<ProcessOutput, ExecError> {
    let program = request.program.display().to_string();
    let io_err = |source| ExecError::Io {
        program: program.clone(),
        source,
    };

    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args)
        .env_clear()
        .envs(&request.env)
        .current_dir(&request.working_dir)
        .kill_on_drop(true);
    // Own process group, so an interrupt also reaches background descendants.
    #[cfg(unix)]
    cmd.process_group(0);

    let ProcessStdio {
        stdin,
        stdout,
        stderr,
    } = request.stdio;

    let mut stdin_text = None;
    match stdin {
        StdinSource::Null => cmd.stdin(Stdio::null()),
        StdinSource::Text(text) => {
            stdin_text = Some(text);
            cmd.stdin(Stdio::piped())
        }
        StdinSource::File(file) => cmd.stdin(Stdio::from(file)),
    };

    // `2>&1` with stdout going to a file: both descriptors share the file.
    let merged_file = match (&stdout, &stderr) {
        (OutputSink::File(file), ErrorSink::MergeWithStdout) => {
            Some(file.try_clone().map_err(io_err)?)
        }
        _ => None,
    };

    match stdout {
        OutputSink::Capture => cmd.stdout(Stdio::piped()),
        OutputSink::File(file) => cmd.stdout(Stdio::from(file)),
    };

    let mut merge_into_capture = false;
    match (stderr, merged_file) {
        (ErrorSink::File(file), _) => cmd.stderr(Stdio::from(file)),
        (ErrorSink::MergeWithStdout, Some(file)) => cmd.stderr(Stdio::from(file)),
        (ErrorSink::MergeWithStdout, None) => {
            merge_into_capture = true;
            cmd.stderr(Stdio::piped())
        }
        (ErrorSink::Capture, _) => cmd.stderr(Stdio::piped()),
    };

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.clone(),
        source,
    })?;
    debug!(program = %program, args = ?request.args, pid = child.id(), "spawned process");

    if let (Some(text), Some(mut pipe)) = (stdin_text, child.stdin.take()) {
        let program = program.clone();
        tokio::spawn(async move {
            // The child may exit without draining stdin; a broken pipe is fine.
            if let Err(e) = pipe.write_all(text.as_bytes()).await {
                debug!(program = %program, error = %e, "stdin write ended early");
            }
        });
    }

    let stdout_task = child.stdout.take().map(|out| tokio::spawn(read_all(out)));
    let stderr_task = child.stderr.take().map(|err| tokio::spawn(read_all(err)));

    // Draining is inside the race too: a descendant may keep the pipes open
    // after the direct child has exited.
    let pid = child.id();
    let (status, mut stdout, stderr) = tokio::select! {
        done = wait_and_drain(&mut child, stdout_task, stderr_task) => done.map_err(io_err)?,
        reason = ctx.interrupted() => {
            info!(program = %program, %reason, "execution interrupted; killing process");
            kill_group(pid, &program);
            if let Err(e) = child.kill().await {
                warn!(program = %program, error = %e, "failed to kill child process");
            }
            return Err(ExecError::Interrupted(reason));
        }
    };

    // Killed by a signal: no exit code, report a generic failure.
    let exit_code = status.code().unwrap_or(1);
    debug!(program = %program, exit_code, "process exited");

    let stderr = if merge_into_capture {
        stdout.extend_from_slice(&stderr);
        String::new()
    } else {
        String::from_utf8_lossy(&stderr).into_owned()
    };

    Ok(ProcessOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr,
    })
}

async fn wait_and_drain(
    child: &mut Child,
    stdout_task: Option<JoinHandle<io::Result<Vec<u8>>>>,
    stderr_task: Option<JoinHandle<io::Result<Vec<u8>>>>,
) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let status = child.wait().await?;
    let stdout = collect(stdout_task).await?;
    let stderr = collect(stderr_task).await?;
    Ok((status, stdout, stderr))
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>, program: &str) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(program = %program, error = %e, "failed to signal process group");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>, _program: &str) {}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

async fn collect(task: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match task {
        Some(handle) => handle.await.map_err(io::Error::other)?,
        None => Ok(Vec::new()),
    }
}
