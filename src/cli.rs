// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `shode`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shode",
    version,
    about = "Run shell scripts through a sandboxed execution engine.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Shode.toml` in the current directory, if present.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SHODE_LOG` or `warn` is used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Disable the command result cache for this run.
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Abort the script after this long (e.g. `30s`, `5m`).
    #[arg(long, value_name = "DURATION", global = true)]
    pub timeout: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse and execute a script file.
    Run {
        /// Script to execute.
        file: PathBuf,

        /// Parse and vet the script, print it, but don't execute anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Execute a single command line.
    Exec {
        /// The command and its arguments, joined with spaces.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_global_flags() {
        let args = CliArgs::try_parse_from([
            "shode",
            "--no-cache",
            "run",
            "script.sh",
            "--dry-run",
            "--timeout",
            "5s",
        ])
        .unwrap();
        assert!(args.no_cache);
        assert_eq!(args.timeout.as_deref(), Some("5s"));
        assert!(matches!(
            args.command,
            Command::Run { ref file, dry_run: true } if file == &PathBuf::from("script.sh")
        ));
    }

    #[test]
    fn exec_keeps_hyphenated_args() {
        let args = CliArgs::try_parse_from(["shode", "exec", "ls", "-la", "/tmp"]).unwrap();
        match args.command {
            Command::Exec { command } => assert_eq!(command, vec!["ls", "-la", "/tmp"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn exec_requires_a_command() {
        assert!(CliArgs::try_parse_from(["shode", "exec"]).is_err());
    }
}
