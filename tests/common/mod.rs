#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use shode::engine::{EngineBuilder, ExecutionEngine};
use shode::env::EnvironmentStore;
use shode::exec::RealExecutorBackend;
use shode::fs::RealFileSystem;
use shode::security::SecurityGate;

pub use shode_test_utils::builders;
pub use shode_test_utils::fake_executor::{FakeExecutor, FakeResponse};
pub use shode_test_utils::gates::{DenyListGate, RecordingGate};
pub use shode_test_utils::{init_tracing, with_timeout};

/// Store rooted at `dir` with an empty `PATH`, so nothing resolves against
/// the host and every process command reaches the backend by bare name.
pub fn sandbox_env(dir: &Path) -> Arc<EnvironmentStore> {
    let home = dir.display().to_string();
    Arc::new(EnvironmentStore::new(
        [("PATH", String::new()), ("HOME", home)],
        dir,
    ))
}

/// Builder over a sandboxed store and the given fake backend and gate.
pub fn fake_builder(
    dir: &Path,
    fake: FakeExecutor,
    gate: Arc<dyn SecurityGate>,
) -> EngineBuilder<FakeExecutor> {
    ExecutionEngine::builder()
        .env(sandbox_env(dir))
        .security(gate)
        .backend(fake)
}

pub fn fake_engine(
    dir: &Path,
    fake: FakeExecutor,
    gate: Arc<dyn SecurityGate>,
) -> ExecutionEngine<FakeExecutor> {
    fake_builder(dir, fake, gate).build()
}

/// Real backend over the host environment, working in `dir`.
pub fn real_engine(dir: &Path, gate: Arc<dyn SecurityGate>) -> ExecutionEngine<RealExecutorBackend> {
    let env = EnvironmentStore::from_process();
    env.change_dir(dir, &RealFileSystem).expect("test dir must exist");
    ExecutionEngine::new(Arc::new(env), gate)
}
