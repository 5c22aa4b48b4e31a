use std::fmt;

/// How a single command was (or will be) executed.
///
/// - `Interpreted`: an in-process intrinsic from the standard library.
/// - `Process`: an external program spawned as an OS process.
/// - `Hybrid`: reserved for cost-based routing; currently runs exactly like
///   `Process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    Interpreted,
    Process,
    Hybrid,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionMode::Interpreted => "interpreted",
            ExecutionMode::Process => "process",
            ExecutionMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}
