//! Injected process-termination capability.

/// The "terminate this process" action invoked on contention.
///
/// The lock manager never decides how a process dies: the surrounding
/// runtime picks the mechanism and exit code by injecting an implementation.
/// Test implementations record the call instead of exiting, so callers must
/// not assume `terminate` diverges.
pub trait Terminator {
    /// Terminate the current process.
    fn terminate(&self);
}

/// Production terminator that exits the process with a fixed code.
#[derive(Debug, Clone, Copy)]
pub struct ProcessTerminator {
    code: i32,
}

impl ProcessTerminator {
    /// Create a terminator that exits with the given code.
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

impl Terminator for ProcessTerminator {
    fn terminate(&self) {
        std::process::exit(self.code);
    }
}
