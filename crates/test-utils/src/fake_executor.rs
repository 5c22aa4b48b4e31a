use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shode::engine::ExecContext;
use shode::exec::{
    BackendFuture, ErrorSink, ExecError, ExecutorBackend, OutputSink, ProcessOutput,
    ProcessRequest, StdinSource,
};

/// What the fake does when asked to run a given program.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// Return this output as-is.
    Output(ProcessOutput),
    /// Sleep, then behave like the default echo; interruptible.
    Sleep(Duration),
    /// Fail as if the program could not be spawned.
    SpawnError,
}

/// Everything worth asserting on from a `ProcessRequest`.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: PathBuf,
    /// Text that arrived on stdin, if any.
    pub stdin: Option<String>,
}

impl RecordedRequest {
    pub fn program_name(&self) -> String {
        program_name(&self.program)
    }
}

/// A fake executor that:
/// - records every request it receives
/// - replays scripted responses keyed by program file name
/// - otherwise echoes: stdin text if there is any, else the args plus `\n`
/// - honours file sinks the way a real child would
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    responses: Arc<Mutex<HashMap<String, FakeResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, program: &str, response: FakeResponse) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .insert(program.to_string(), response);
        self
    }

    /// Shorthand for an `Output` response.
    pub fn respond_with(&self, program: &str, exit_code: i32, stdout: &str, stderr: &str) -> &Self {
        self.respond(
            program,
            FakeResponse::Output(ProcessOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        )
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// How many times a program with this file name was run.
    pub fn calls(&self, program: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.program_name() == program)
            .count()
    }
}

impl ExecutorBackend for FakeExecutor {
    fn run<'a>(&'a self, request: ProcessRequest, ctx: &'a ExecContext) -> BackendFuture<'a> {
        Box::pin(async move {
            let name = program_name(&request.program);
            let io_err = |source: io::Error| ExecError::Io {
                program: name.clone(),
                source,
            };

            let ProcessRequest {
                program,
                args,
                env,
                working_dir,
                stdio,
            } = request;

            let stdin = match stdio.stdin {
                StdinSource::Null => None,
                StdinSource::Text(text) => Some(text),
                StdinSource::File(mut file) => {
                    let mut text = String::new();
                    file.read_to_string(&mut text).map_err(io_err)?;
                    Some(text)
                }
            };

            self.requests.lock().unwrap().push(RecordedRequest {
                program,
                args: args.clone(),
                env,
                working_dir,
                stdin: stdin.clone(),
            });

            let response = self.responses.lock().unwrap().get(&name).cloned();
            let output = match response {
                Some(FakeResponse::Output(output)) => output,
                Some(FakeResponse::SpawnError) => {
                    return Err(ExecError::Spawn {
                        program: name.clone(),
                        source: io::Error::new(io::ErrorKind::NotFound, "fake spawn failure"),
                    });
                }
                Some(FakeResponse::Sleep(delay)) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => echo(&args, stdin.as_deref()),
                        reason = ctx.interrupted() => return Err(ExecError::Interrupted(reason)),
                    }
                }
                None => echo(&args, stdin.as_deref()),
            };

            route(output, stdio.stdout, stdio.stderr).map_err(io_err)
        })
    }
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn echo(args: &[String], stdin: Option<&str>) -> ProcessOutput {
    let stdout = match stdin {
        Some(text) => text.to_string(),
        None => format!("{}\n", args.join(" ")),
    };
    ProcessOutput {
        exit_code: 0,
        stdout,
        stderr: String::new(),
    }
}

/// Apply the stdio sinks to a scripted output.
fn route(output: ProcessOutput, stdout: OutputSink, stderr: ErrorSink) -> io::Result<ProcessOutput> {
    let ProcessOutput {
        exit_code,
        stdout: mut out,
        stderr: mut err,
    } = output;

    let mut stdout_file: Option<File> = None;
    match stdout {
        OutputSink::Capture => {}
        OutputSink::File(mut file) => {
            file.write_all(out.as_bytes())?;
            out.clear();
            stdout_file = Some(file);
        }
    }

    match stderr {
        ErrorSink::Capture => {}
        ErrorSink::File(mut file) => {
            file.write_all(err.as_bytes())?;
            err.clear();
        }
        ErrorSink::MergeWithStdout => {
            match stdout_file.as_mut() {
                Some(file) => file.write_all(err.as_bytes())?,
                None => out.push_str(&err),
            }
            err.clear();
        }
    }

    Ok(ProcessOutput {
        exit_code,
        stdout: out,
        stderr: err,
    })
}
