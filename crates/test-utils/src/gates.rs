//! Security gates for tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use shode::ast::CommandNode;
use shode::security::{SecurityGate, SecurityViolation};

/// Allows everything, counts and records every vetted command.
#[derive(Debug, Default)]
pub struct RecordingGate {
    checks: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl RecordingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    /// Number of times a command named `name` was vetted.
    pub fn checks_for(&self, name: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|n| *n == name).count()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl SecurityGate for RecordingGate {
    fn check(&self, cmd: &CommandNode) -> Result<(), SecurityViolation> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(cmd.name.clone());
        Ok(())
    }
}

/// Rejects a fixed set of command names, allows the rest.
#[derive(Debug, Default)]
pub struct DenyListGate {
    denied: HashSet<String>,
}

impl DenyListGate {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denied: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl SecurityGate for DenyListGate {
    fn check(&self, cmd: &CommandNode) -> Result<(), SecurityViolation> {
        if self.denied.contains(&cmd.name) {
            Err(SecurityViolation::DangerousCommand(cmd.name.clone()))
        } else {
            Ok(())
        }
    }
}
