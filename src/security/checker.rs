// src/security/checker.rs

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};

use super::{SecurityGate, SecurityViolation};
use crate::ast::CommandNode;
use crate::config::SecuritySettings;

const DANGEROUS_COMMANDS: &[&str] = &[
    "rm", "rmdir", "shutdown", "reboot", "halt", "poweroff", "mkfs", "dd", "fdisk", "useradd",
    "userdel", "usermod", "groupadd", "groupdel", "sudo", "su", "chown", "killall",
];

const NETWORK_COMMANDS: &[&str] = &[
    "iptables", "ip6tables", "ufw", "firewall-cmd", "nft", "ifconfig", "route",
];

const SENSITIVE_PATHS: &[&str] = &[
    "/etc/passwd",
    "/etc/shadow",
    "/etc/sudoers",
    "/etc/ssh/",
    "/root/",
    "/boot/",
];

/// Default policy: deny lists for dangerous and network administration
/// commands, sensitive paths anywhere in the arguments or redirect target,
/// passwords on the command line, and configurable regex deny patterns.
#[derive(Debug, Clone)]
pub struct SecurityChecker {
    dangerous: BTreeSet<String>,
    network: BTreeSet<String>,
    sensitive_paths: Vec<String>,
    deny_patterns: Vec<Regex>,
}

/// Everything the checker knows about one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityReport {
    pub command: String,
    pub arguments: Vec<String>,
    pub is_dangerous_command: bool,
    pub is_network_command: bool,
    pub sensitive_files: Vec<String>,
    pub violation: Option<SecurityViolation>,
}

impl Default for SecurityChecker {
    fn default() -> Self {
        Self {
            dangerous: DANGEROUS_COMMANDS.iter().map(|s| s.to_string()).collect(),
            network: NETWORK_COMMANDS.iter().map(|s| s.to_string()).collect(),
            sensitive_paths: SENSITIVE_PATHS.iter().map(|s| s.to_string()).collect(),
            deny_patterns: Vec::new(),
        }
    }
}

impl SecurityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in policy adjusted by the `[security]` config section.
    pub fn from_settings(settings: &SecuritySettings) -> Self {
        let mut checker = Self::default();
        for cmd in &settings.extra_dangerous {
            checker.add_dangerous_command(cmd);
        }
        for cmd in &settings.allow {
            checker.remove_dangerous_command(cmd);
        }
        checker.deny_patterns = settings.deny_patterns.clone();
        checker
    }

    pub fn add_dangerous_command(&mut self, name: &str) {
        self.dangerous.insert(name.to_string());
    }

    /// Remove `name` from both the dangerous and network lists.
    pub fn remove_dangerous_command(&mut self, name: &str) {
        self.dangerous.remove(name);
        self.network.remove(name);
    }

    pub fn add_deny_pattern(&mut self, pattern: Regex) {
        self.deny_patterns.push(pattern);
    }

    pub fn report(&self, cmd: &CommandNode) -> SecurityReport {
        let base = base_name(&cmd.name);
        SecurityReport {
            command: cmd.name.clone(),
            arguments: cmd.args.clone(),
            is_dangerous_command: self.dangerous.contains(base),
            is_network_command: self.network.contains(base),
            sensitive_files: self.sensitive_words(cmd).map(str::to_string).collect(),
            violation: self.evaluate(cmd).err(),
        }
    }

    fn evaluate(&self, cmd: &CommandNode) -> Result<(), SecurityViolation> {
        let base = base_name(&cmd.name);

        if self.dangerous.contains(base) {
            return Err(SecurityViolation::DangerousCommand(base.to_string()));
        }
        if self.network.contains(base) {
            return Err(SecurityViolation::NetworkCommand(base.to_string()));
        }
        if let Some(word) = self.sensitive_words(cmd).next() {
            return Err(SecurityViolation::SensitivePath(word.to_string()));
        }
        if let Some(arg) = cmd.args.iter().find(|a| is_password_flag(a)) {
            let flag = arg.split('=').next().unwrap_or(arg);
            return Err(SecurityViolation::CredentialInArgs(flag.to_string()));
        }

        if !self.deny_patterns.is_empty() {
            let line = cmd.to_string();
            if let Some(re) = self.deny_patterns.iter().find(|re| re.is_match(&line)) {
                return Err(SecurityViolation::DeniedPattern(re.as_str().to_string()));
            }
        }

        Ok(())
    }

    /// Arguments and the redirect target that touch a sensitive path.
    fn sensitive_words<'a>(&'a self, cmd: &'a CommandNode) -> impl Iterator<Item = &'a str> + 'a {
        cmd.args
            .iter()
            .map(String::as_str)
            .chain(cmd.redirect.as_ref().map(|r| r.target.as_str()))
            .filter(move |word| self.sensitive_paths.iter().any(|p| word.contains(p.as_str())))
    }
}

impl SecurityGate for SecurityChecker {
    fn check(&self, cmd: &CommandNode) -> Result<(), SecurityViolation> {
        let verdict = self.evaluate(cmd);
        match &verdict {
            Ok(()) => debug!(command = %cmd.name, "security check passed"),
            Err(violation) => warn!(command = %cmd, %violation, "security check rejected command"),
        }
        verdict
    }
}

fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}

fn is_password_flag(arg: &str) -> bool {
    arg == "--password" || arg.starts_with("--password=")
}
