// src/stdlib/mod.rs

//! In-process standard library ("intrinsics").
//!
//! Intrinsics never spawn a process. They read and write files through the
//! [`FileSystem`] trait and resolve relative paths against the
//! environment store's working directory, not the host process's.

mod intrinsic;

pub use intrinsic::Intrinsic;

use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::env::{EnvError, EnvironmentStore};
use crate::fs::{self, FileSystem, RealFileSystem};

/// Text produced by one intrinsic call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntrinsicOutput {
    pub stdout: String,
    pub stderr: String,
}

impl IntrinsicOutput {
    fn stdout(text: impl Into<String>) -> Self {
        Self {
            stdout: text.into(),
            stderr: String::new(),
        }
    }

    fn stderr(text: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: text.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntrinsicError {
    #[error("{intrinsic} requires {expected}")]
    MissingArgument {
        intrinsic: Intrinsic,
        expected: &'static str,
    },

    #[error("{intrinsic}: {message}")]
    Fs {
        intrinsic: Intrinsic,
        message: String,
    },

    #[error("{intrinsic}: {source}")]
    Env {
        intrinsic: Intrinsic,
        #[source]
        source: EnvError,
    },
}

#[derive(Debug, Clone)]
pub struct StdLib {
    fs: Arc<dyn FileSystem>,
}

impl Default for StdLib {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl StdLib {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Run one intrinsic.
    ///
    /// `input` is piped-in text (previous pipeline stage or `<` redirect).
    /// Text-processing intrinsics use it as their subject when the subject
    /// argument is omitted.
    pub fn call(
        &self,
        intrinsic: Intrinsic,
        args: &[String],
        input: Option<&str>,
        env: &EnvironmentStore,
    ) -> Result<IntrinsicOutput, IntrinsicError> {
        trace!(%intrinsic, ?args, piped = input.is_some(), "calling intrinsic");

        let missing = |expected| IntrinsicError::MissingArgument {
            intrinsic,
            expected,
        };
        let fs_err = |e: anyhow::Error| IntrinsicError::Fs {
            intrinsic,
            message: format!("{e:#}"),
        };

        let out = match intrinsic {
            Intrinsic::Print => IntrinsicOutput::stdout(text_or_input(args, input)),
            Intrinsic::Println => IntrinsicOutput::stdout(text_or_input(args, input) + "\n"),
            Intrinsic::Error => IntrinsicOutput::stderr(text_or_input(args, input)),
            Intrinsic::Errorln => IntrinsicOutput::stderr(text_or_input(args, input) + "\n"),

            Intrinsic::ReadFile => {
                let path = args.first().ok_or_else(|| missing("a filename argument"))?;
                let path = fs::resolve(&env.working_dir(), path);
                IntrinsicOutput::stdout(self.fs.read_to_string(&path).map_err(fs_err)?)
            }
            Intrinsic::WriteFile => {
                let (path, rest) = args
                    .split_first()
                    .ok_or_else(|| missing("filename and content arguments"))?;
                let content = if !rest.is_empty() {
                    rest.join(" ")
                } else {
                    input
                        .map(str::to_string)
                        .ok_or_else(|| missing("filename and content arguments"))?
                };
                let path = fs::resolve(&env.working_dir(), path);
                self.fs.write(&path, content.as_bytes()).map_err(fs_err)?;
                IntrinsicOutput::stdout("File written")
            }
            Intrinsic::ListFiles => {
                let dir = args.first().map(String::as_str).unwrap_or(".");
                let dir = fs::resolve(&env.working_dir(), dir);
                let mut names = self.fs.list_dir(&dir).map_err(fs_err)?;
                names.sort();
                IntrinsicOutput::stdout(names.join("\n"))
            }
            Intrinsic::FileExists => {
                let path = args.first().ok_or_else(|| missing("a filename argument"))?;
                let path = fs::resolve(&env.working_dir(), path);
                IntrinsicOutput::stdout(self.fs.exists(&path).to_string())
            }

            Intrinsic::Contains => {
                let (haystack, needle) = match (args, input) {
                    ([haystack, needle, ..], _) => (haystack.as_str(), needle.as_str()),
                    ([needle], Some(input)) => (input, needle.as_str()),
                    _ => return Err(missing("haystack and needle arguments")),
                };
                IntrinsicOutput::stdout(haystack.contains(needle).to_string())
            }
            Intrinsic::Replace => {
                let (subject, old, new) = match (args, input) {
                    ([subject, old, new, ..], _) => (subject.as_str(), old, new),
                    ([old, new], Some(input)) => (input, old, new),
                    _ => return Err(missing("string, old and new arguments")),
                };
                IntrinsicOutput::stdout(subject.replace(old.as_str(), new))
            }
            Intrinsic::ToUpper => IntrinsicOutput::stdout(subject(args, input).to_uppercase()),
            Intrinsic::ToLower => IntrinsicOutput::stdout(subject(args, input).to_lowercase()),
            Intrinsic::Trim => IntrinsicOutput::stdout(subject(args, input).trim()),

            Intrinsic::GetEnv => {
                let key = args
                    .first()
                    .ok_or_else(|| missing("an environment variable name"))?;
                IntrinsicOutput::stdout(env.get(key).unwrap_or_default())
            }
            Intrinsic::SetEnv => {
                let [key, value, ..] = args else {
                    return Err(missing("key and value arguments"));
                };
                env.set(key.as_str(), value.as_str());
                IntrinsicOutput::stdout("Environment variable set")
            }
            Intrinsic::WorkingDir => {
                IntrinsicOutput::stdout(env.working_dir().display().to_string())
            }
            Intrinsic::ChangeDir => {
                let dir = args.first().ok_or_else(|| missing("a directory path"))?;
                env.change_dir(dir, self.fs.as_ref())
                    .map_err(|source| IntrinsicError::Env { intrinsic, source })?;
                IntrinsicOutput::stdout("Directory changed")
            }
        };

        Ok(out)
    }
}

/// Joined args, or the piped input when there are none.
fn text_or_input(args: &[String], input: Option<&str>) -> String {
    if args.is_empty() {
        input.unwrap_or_default().to_string()
    } else {
        args.join(" ")
    }
}

/// First arg, or the piped input when there are none.
fn subject<'a>(args: &'a [String], input: Option<&'a str>) -> &'a str {
    args.first()
        .map(String::as_str)
        .or(input)
        .unwrap_or_default()
}
