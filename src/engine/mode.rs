// src/engine/mode.rs

use std::path::PathBuf;

use tracing::trace;

use crate::ast::CommandNode;
use crate::env::EnvironmentStore;
use crate::stdlib::Intrinsic;
use crate::types::ExecutionMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDecision {
    pub mode: ExecutionMode,
    /// Set for interpreted commands.
    pub intrinsic: Option<Intrinsic>,
    /// Program found on the store's `PATH`; `None` if the lookup failed.
    pub resolved: Option<PathBuf>,
}

/// Chooses how a command runs.
///
/// Intrinsic names always win over same-named binaries. Everything else is
/// a process, resolved against the environment store's `PATH` and working
/// directory rather than the host's.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeSelector;

impl ModeSelector {
    pub fn decide(&self, cmd: &CommandNode, env: &EnvironmentStore) -> ModeDecision {
        if let Some(intrinsic) = Intrinsic::from_name(&cmd.name) {
            return ModeDecision {
                mode: ExecutionMode::Interpreted,
                intrinsic: Some(intrinsic),
                resolved: None,
            };
        }

        let path_var = env.get("PATH").unwrap_or_default();
        let resolved = which::which_in(&cmd.name, Some(&path_var), env.working_dir()).ok();
        trace!(command = %cmd.name, ?resolved, "resolved program");

        ModeDecision {
            mode: ExecutionMode::Process,
            intrinsic: None,
            resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsics_are_interpreted() {
        let env = EnvironmentStore::new([("PATH", "/usr/bin:/bin")], "/");
        for intrinsic in Intrinsic::ALL {
            let decision = ModeSelector.decide(&CommandNode::new(intrinsic.name(), ["x"]), &env);
            assert_eq!(decision.mode, ExecutionMode::Interpreted);
            assert_eq!(decision.intrinsic, Some(intrinsic));
        }
    }

    #[cfg(unix)]
    fn executable(dir: &std::path::Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let bin = dir.join(name);
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        bin
    }

    #[cfg(unix)]
    #[test]
    fn intrinsic_beats_same_named_binary_on_path() {
        let tmp = tempfile::tempdir().unwrap();
        executable(tmp.path(), "Print");
        let env = EnvironmentStore::new([("PATH", tmp.path().to_str().unwrap())], "/");
        let cmd = CommandNode::new("Print", ["hi"]);

        let first = ModeSelector.decide(&cmd, &env);
        assert_eq!(first.mode, ExecutionMode::Interpreted);
        assert_eq!(first.intrinsic, Some(Intrinsic::Print));
        assert_eq!(first.resolved, None);
        assert_eq!(ModeSelector.decide(&cmd, &env), first);

        // Lookup is case-sensitive, so a lowercase name goes to the binary.
        executable(tmp.path(), "print");
        let lower = ModeSelector.decide(&CommandNode::new("print", ["hi"]), &env);
        assert_eq!(lower.mode, ExecutionMode::Process);
        assert_eq!(lower.resolved, Some(tmp.path().join("print")));
    }

    #[cfg(unix)]
    #[test]
    fn resolves_against_store_path() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = executable(tmp.path(), "mytool");

        let env = EnvironmentStore::new([("PATH", tmp.path().to_str().unwrap())], "/");
        let decision = ModeSelector.decide(&CommandNode::new("mytool", Vec::<String>::new()), &env);
        assert_eq!(decision.mode, ExecutionMode::Process);
        assert_eq!(decision.resolved, Some(bin));
    }

    #[test]
    fn unknown_program_is_still_a_process() {
        let env = EnvironmentStore::new([("PATH", "")], "/");
        let decision = ModeSelector.decide(
            &CommandNode::new("no-such-program-xyz", Vec::<String>::new()),
            &env,
        );
        assert_eq!(decision.mode, ExecutionMode::Process);
        assert!(decision.resolved.is_none());
    }
}
