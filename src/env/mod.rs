// src/env/mod.rs

//! Shell environment state shared by every execution call.
//!
//! [`EnvironmentStore`] holds the variable map and the working directory
//! behind a single `RwLock`: reads run concurrently, any mutation
//! (`set`, `unset`, `change_dir`, ...) is exclusive. Spawned children never
//! see the live map; they get an [`EnvSnapshot`] taken right before spawn.

pub mod expand;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::debug;

use crate::ast::CommandNode;
use crate::fs::FileSystem;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Point-in-time copy of the environment handed to a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSnapshot {
    pub vars: HashMap<String, String>,
    pub working_dir: PathBuf,
}

#[derive(Debug)]
struct EnvState {
    vars: HashMap<String, String>,
    working_dir: PathBuf,
}

#[derive(Debug)]
pub struct EnvironmentStore {
    state: RwLock<EnvState>,
    /// Variables the store was created with, for `restore_original`.
    original: HashMap<String, String>,
}

impl EnvironmentStore {
    pub fn new<I, K, V>(vars: I, working_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            original: vars.clone(),
            state: RwLock::new(EnvState {
                vars,
                working_dir: working_dir.into(),
            }),
        }
    }

    /// Seed the store from the current process environment and directory.
    pub fn from_process() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(std::env::vars(), cwd)
    }

    fn read(&self) -> RwLockReadGuard<'_, EnvState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EnvState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().vars.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        debug!(%key, %value, "setting environment variable");
        self.write().vars.insert(key, value);
    }

    pub fn unset(&self, key: &str) -> Option<String> {
        self.write().vars.remove(key)
    }

    pub fn working_dir(&self) -> PathBuf {
        self.read().working_dir.clone()
    }

    /// Change the working directory; relative paths resolve against the
    /// current one. The target must be a directory according to `fs`.
    pub fn change_dir(&self, dir: impl AsRef<Path>, fs: &dyn FileSystem) -> Result<PathBuf, EnvError> {
        let mut state = self.write();
        let target = normalize(&state.working_dir.join(dir.as_ref()));
        if !fs.is_dir(&target) {
            return Err(EnvError::DirectoryNotFound(target));
        }
        debug!(dir = ?target, "changing working directory");
        state.working_dir = target.clone();
        Ok(target)
    }

    pub fn snapshot(&self) -> EnvSnapshot {
        let state = self.read();
        EnvSnapshot {
            vars: state.vars.clone(),
            working_dir: state.working_dir.clone(),
        }
    }

    /// Drop every change made since construction.
    pub fn restore_original(&self) {
        self.write().vars = self.original.clone();
    }

    pub fn append_to_path(&self, dir: &str) {
        let mut state = self.write();
        let updated = match state.vars.get("PATH") {
            Some(current) if !current.is_empty() => {
                format!("{current}{}{dir}", path_separator())
            }
            _ => dir.to_string(),
        };
        state.vars.insert("PATH".to_string(), updated);
    }

    pub fn prepend_to_path(&self, dir: &str) {
        let mut state = self.write();
        let updated = match state.vars.get("PATH") {
            Some(current) if !current.is_empty() => {
                format!("{dir}{}{current}", path_separator())
            }
            _ => dir.to_string(),
        };
        state.vars.insert("PATH".to_string(), updated);
    }

    /// Expand `$NAME` / `${NAME}` references in `input`.
    pub fn expand(&self, input: &str) -> String {
        if !input.contains('$') {
            return input.to_string();
        }
        let state = self.read();
        expand::expand_with(input, |name| state.vars.get(name).map(String::as_str))
    }

    /// Owned copy of `cmd` with every word expanded.
    pub fn expand_command(&self, cmd: &CommandNode) -> CommandNode {
        CommandNode {
            name: self.expand(&cmd.name),
            args: cmd.args.iter().map(|a| self.expand(a)).collect(),
            redirect: cmd.redirect.as_ref().map(|r| {
                let mut r = r.clone();
                r.target = self.expand(&r.target);
                r
            }),
        }
    }
}

fn path_separator() -> char {
    if cfg!(windows) { ';' } else { ':' }
}

/// Lexically clean `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::RedirectNode;
    use crate::fs::RealFileSystem;
    use crate::fs::mock::MockFileSystem;

    fn store() -> EnvironmentStore {
        EnvironmentStore::new([("HOME", "/home/u"), ("PATH", "/bin")], "/")
    }

    #[test]
    fn set_get_unset() {
        let env = store();
        env.set("X", "1");
        assert_eq!(env.get("X").as_deref(), Some("1"));
        assert_eq!(env.unset("X").as_deref(), Some("1"));
        assert_eq!(env.get("X"), None);
    }

    #[test]
    fn restore_original_drops_changes() {
        let env = store();
        env.set("X", "1");
        env.unset("HOME");
        env.restore_original();
        assert_eq!(env.get("X"), None);
        assert_eq!(env.get("HOME").as_deref(), Some("/home/u"));
    }

    #[test]
    fn path_helpers() {
        let env = store();
        env.append_to_path("/custom/bin");
        env.prepend_to_path("/first");
        let sep = path_separator();
        assert_eq!(
            env.get("PATH").unwrap(),
            format!("/first{sep}/bin{sep}/custom/bin")
        );
    }

    #[test]
    fn change_dir_resolves_relative_and_rejects_missing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        let env = EnvironmentStore::new(Vec::<(String, String)>::new(), tmp.path());

        let new_dir = env.change_dir("sub", &RealFileSystem).unwrap();
        assert_eq!(new_dir, tmp.path().join("sub"));
        assert_eq!(env.change_dir("..", &RealFileSystem).unwrap(), tmp.path());

        let err = env.change_dir("does-not-exist", &RealFileSystem).unwrap_err();
        assert!(matches!(err, EnvError::DirectoryNotFound(_)));
        assert_eq!(env.working_dir(), tmp.path());
    }

    #[test]
    fn change_dir_asks_the_filesystem() {
        let mock = MockFileSystem::new();
        mock.add_dir("/virtual/dir");
        mock.add_file("/virtual/file.txt", "x");
        let env = EnvironmentStore::new(Vec::<(String, String)>::new(), "/virtual");

        let err = env.change_dir("file.txt", &mock).unwrap_err();
        assert_eq!(err, EnvError::DirectoryNotFound(PathBuf::from("/virtual/file.txt")));
        assert_eq!(env.change_dir("dir", &mock).unwrap(), PathBuf::from("/virtual/dir"));
        assert_eq!(env.working_dir(), PathBuf::from("/virtual/dir"));
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let env = store();
        let snap = env.snapshot();
        env.set("LATER", "yes");
        assert!(!snap.vars.contains_key("LATER"));
    }

    #[test]
    fn expand_command_expands_all_words() {
        let env = store();
        env.set("F", "out.txt");
        let cmd = CommandNode::new("echo", ["$HOME", "${F}x"])
            .with_redirect(RedirectNode::truncate("$F"));
        let expanded = env.expand_command(&cmd);
        assert_eq!(expanded.args, vec!["/home/u", "out.txtx"]);
        assert_eq!(expanded.redirect.unwrap().target, "out.txt");
        // original untouched
        assert_eq!(cmd.args[0], "$HOME");
    }
}
