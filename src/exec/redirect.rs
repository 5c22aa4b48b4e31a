// src/exec/redirect.rs

//! Binding of a command's redirection to files or streams.
//!
//! | op     | effect                                                    |
//! |--------|-----------------------------------------------------------|
//! | `>`    | truncate/create target; fd 0/1 -> stdout, fd 2 -> stderr  |
//! | `>>`   | append/create target; fd as above                         |
//! | `<`    | read target as stdin                                      |
//! | `2>&1` | stderr follows stdout                                     |
//! | `&>`   | one target for both stdout and stderr                     |

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::ast::RedirectNode;
use crate::exec::backend::{ErrorSink, OutputSink, ProcessStdio, StdinSource};
use crate::fs::{self, FileSystem};
use crate::stdlib::IntrinsicOutput;

#[derive(Error, Debug)]
pub enum RedirectError {
    #[error("unsupported redirect operator '{0}'")]
    UnsupportedOperator(String),

    #[error("invalid file descriptor {fd} for '{op}'")]
    InvalidFd { op: String, fd: u32 },

    #[error("missing target for '{0}'")]
    MissingTarget(String),

    #[error("cannot open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Fs(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    Truncate,
    Append,
    Input,
    MergeStderr,
    Both,
}

impl RedirectOp {
    pub fn parse(op: &str) -> Result<Self, RedirectError> {
        match op {
            ">" => Ok(RedirectOp::Truncate),
            ">>" => Ok(RedirectOp::Append),
            "<" => Ok(RedirectOp::Input),
            "2>&1" => Ok(RedirectOp::MergeStderr),
            "&>" => Ok(RedirectOp::Both),
            other => Err(RedirectError::UnsupportedOperator(other.to_string())),
        }
    }

    fn needs_target(self) -> bool {
        !matches!(self, RedirectOp::MergeStderr)
    }
}

/// Which output stream a `>`/`>>` applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// A validated redirection with its target resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPlan {
    pub op: RedirectOp,
    stream: Stream,
    pub target: PathBuf,
}

impl RedirectPlan {
    pub fn is_input(&self) -> bool {
        self.op == RedirectOp::Input
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectionManager;

impl RedirectionManager {
    /// Validate `redirect` and resolve its target against `cwd`.
    pub fn plan(&self, redirect: &RedirectNode, cwd: &Path) -> Result<RedirectPlan, RedirectError> {
        let op = RedirectOp::parse(&redirect.op)?;

        let stream = match (op, redirect.fd) {
            (RedirectOp::Truncate | RedirectOp::Append, 0 | 1) => Stream::Stdout,
            (RedirectOp::Truncate | RedirectOp::Append, 2) => Stream::Stderr,
            (RedirectOp::Truncate | RedirectOp::Append, fd) => {
                return Err(RedirectError::InvalidFd {
                    op: redirect.op.clone(),
                    fd,
                });
            }
            _ => Stream::Stdout,
        };

        if op.needs_target() && redirect.target.is_empty() {
            return Err(RedirectError::MissingTarget(redirect.op.clone()));
        }

        Ok(RedirectPlan {
            op,
            stream,
            target: fs::resolve(cwd, &redirect.target),
        })
    }

    /// Build the stdio plan for a child process.
    ///
    /// `piped_input` is the previous pipeline stage's output; an explicit
    /// `<` redirect takes precedence over it.
    pub fn bind_process(
        &self,
        redirect: Option<&RedirectNode>,
        cwd: &Path,
        piped_input: Option<String>,
    ) -> Result<ProcessStdio, RedirectError> {
        let mut stdio = ProcessStdio {
            stdin: piped_input.map_or(StdinSource::Null, StdinSource::Text),
            ..ProcessStdio::default()
        };

        let Some(redirect) = redirect else {
            return Ok(stdio);
        };
        let plan = self.plan(redirect, cwd)?;
        debug!(op = ?plan.op, target = ?plan.target, "binding process redirect");

        match plan.op {
            RedirectOp::Truncate | RedirectOp::Append => {
                let file = open_output(&plan.target, plan.op == RedirectOp::Append)?;
                match plan.stream {
                    Stream::Stdout => stdio.stdout = OutputSink::File(file),
                    Stream::Stderr => stdio.stderr = ErrorSink::File(file),
                }
            }
            RedirectOp::Input => {
                let file = File::open(&plan.target).map_err(|source| RedirectError::Open {
                    path: plan.target.clone(),
                    source,
                })?;
                stdio.stdin = StdinSource::File(file);
            }
            RedirectOp::MergeStderr => stdio.stderr = ErrorSink::MergeWithStdout,
            RedirectOp::Both => {
                let file = open_output(&plan.target, false)?;
                let second = file.try_clone().map_err(|source| RedirectError::Open {
                    path: plan.target.clone(),
                    source,
                })?;
                stdio.stdout = OutputSink::File(file);
                stdio.stderr = ErrorSink::File(second);
            }
        }

        Ok(stdio)
    }

    /// Content of a `<` target for an in-process command.
    pub fn read_input(&self, fs: &dyn FileSystem, plan: &RedirectPlan) -> Result<String, RedirectError> {
        fs.read_to_string(&plan.target)
            .map_err(|e| RedirectError::Fs(format!("{e:#}")))
    }

    /// Send an in-process command's output where `plan` says. Whatever is
    /// not redirected is returned.
    pub fn route_output(
        &self,
        fs: &dyn FileSystem,
        plan: &RedirectPlan,
        output: IntrinsicOutput,
    ) -> Result<IntrinsicOutput, RedirectError> {
        let write = |text: &str, append: bool| {
            let res = if append {
                fs.append(&plan.target, text.as_bytes())
            } else {
                fs.write(&plan.target, text.as_bytes())
            };
            res.map_err(|e| RedirectError::Fs(format!("{e:#}")))
        };

        let IntrinsicOutput { stdout, stderr } = output;
        let routed = match (plan.op, plan.stream) {
            (RedirectOp::Truncate | RedirectOp::Append, Stream::Stdout) => {
                write(&stdout, plan.op == RedirectOp::Append)?;
                IntrinsicOutput {
                    stdout: String::new(),
                    stderr,
                }
            }
            (RedirectOp::Truncate | RedirectOp::Append, Stream::Stderr) => {
                write(&stderr, plan.op == RedirectOp::Append)?;
                IntrinsicOutput {
                    stdout,
                    stderr: String::new(),
                }
            }
            (RedirectOp::Both, _) => {
                write(&(stdout + &stderr), false)?;
                IntrinsicOutput::default()
            }
            (RedirectOp::MergeStderr, _) => IntrinsicOutput {
                stdout: stdout + &stderr,
                stderr: String::new(),
            },
            (RedirectOp::Input, _) => IntrinsicOutput { stdout, stderr },
        };
        Ok(routed)
    }
}

fn open_output(path: &Path, append: bool) -> Result<File, RedirectError> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path).map_err(|source| RedirectError::Open {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn out(stdout: &str, stderr: &str) -> IntrinsicOutput {
        IntrinsicOutput {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn rejects_unknown_operators_and_fds() {
        let mgr = RedirectionManager;
        let cwd = Path::new("/work");
        assert!(matches!(
            mgr.plan(&RedirectNode::new("<<", "x", 0), cwd),
            Err(RedirectError::UnsupportedOperator(op)) if op == "<<"
        ));
        assert!(matches!(
            mgr.plan(&RedirectNode::new(">", "x", 3), cwd),
            Err(RedirectError::InvalidFd { fd: 3, .. })
        ));
        assert!(matches!(
            mgr.plan(&RedirectNode::new(">", "", 1), cwd),
            Err(RedirectError::MissingTarget(_))
        ));
    }

    #[test]
    fn plan_resolves_relative_targets() {
        let plan = RedirectionManager
            .plan(&RedirectNode::truncate("out.txt"), Path::new("/work"))
            .unwrap();
        assert_eq!(plan.target, PathBuf::from("/work/out.txt"));
        let plan = RedirectionManager
            .plan(&RedirectNode::new("2>&1", "", 2), Path::new("/work"))
            .unwrap();
        assert_eq!(plan.op, RedirectOp::MergeStderr);
    }

    #[test]
    fn bind_process_opens_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = RedirectionManager;

        let stdio = mgr
            .bind_process(Some(&RedirectNode::truncate("o.txt")), tmp.path(), None)
            .unwrap();
        assert!(matches!(stdio.stdout, OutputSink::File(_)));
        assert!(tmp.path().join("o.txt").exists());

        let stdio = mgr
            .bind_process(Some(&RedirectNode::new(">", "e.txt", 2)), tmp.path(), None)
            .unwrap();
        assert!(matches!(stdio.stderr, ErrorSink::File(_)));
        assert!(matches!(stdio.stdout, OutputSink::Capture));

        let stdio = mgr
            .bind_process(Some(&RedirectNode::new("&>", "both.txt", 1)), tmp.path(), None)
            .unwrap();
        assert!(matches!(
            (stdio.stdout, stdio.stderr),
            (OutputSink::File(_), ErrorSink::File(_))
        ));
    }

    #[test]
    fn input_redirect_beats_piped_text() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("in.txt"), "data").unwrap();
        let stdio = RedirectionManager
            .bind_process(
                Some(&RedirectNode::input("in.txt")),
                tmp.path(),
                Some("piped".into()),
            )
            .unwrap();
        assert!(matches!(stdio.stdin, StdinSource::File(_)));

        let stdio = RedirectionManager
            .bind_process(None, tmp.path(), Some("piped".into()))
            .unwrap();
        assert!(matches!(stdio.stdin, StdinSource::Text(ref t) if t == "piped"));
    }

    #[test]
    fn missing_input_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RedirectionManager
            .bind_process(Some(&RedirectNode::input("nope")), tmp.path(), None)
            .unwrap_err();
        assert!(matches!(err, RedirectError::Open { .. }));
    }

    #[test]
    fn route_output_for_intrinsics() {
        let fs = MockFileSystem::new();
        let mgr = RedirectionManager;
        let cwd = Path::new("/w");

        let plan = mgr.plan(&RedirectNode::truncate("f"), cwd).unwrap();
        let rest = mgr.route_output(&fs, &plan, out("X", "warn")).unwrap();
        assert_eq!(rest, out("", "warn"));

        let plan = mgr.plan(&RedirectNode::append("f"), cwd).unwrap();
        mgr.route_output(&fs, &plan, out("X", "")).unwrap();
        assert_eq!(fs.contents("/w/f").unwrap(), b"XX");

        let plan = mgr.plan(&RedirectNode::new("2>&1", "", 2), cwd).unwrap();
        let rest = mgr.route_output(&fs, &plan, out("a", "b")).unwrap();
        assert_eq!(rest, out("ab", ""));

        let plan = mgr.plan(&RedirectNode::new("&>", "all", 1), cwd).unwrap();
        let rest = mgr.route_output(&fs, &plan, out("a", "b")).unwrap();
        assert_eq!(rest, IntrinsicOutput::default());
        assert_eq!(fs.contents("/w/all").unwrap(), b"ab");
    }
}
