//! Tracee launch (spec §4.4.1 steps 1-2). Raw `fork` + `PTRACE_TRACEME` +
//! `execvp`, mirroring the original tool's own launch sequence rather
//! than `std::process::Command`'s pre_exec hook, since both the parent
//! and the child must pin CPU affinity *before* the child execs.

use std::ffi::CString;

use nix::sys::ptrace;
use nix::unistd::{execvp, fork, ForkResult, Pid};

use crate::affinity;
use crate::error::{EngineError, EngineResult};

/// Forks, pins both halves to the same CPU, and in the child requests
/// tracing and execs `argv[0]` with `argv`. Returns the tracee's pid to
/// the parent; never returns in the child (a failed `execvp` exits the
/// child with status 127).
///
/// # Safety
/// Calls `fork(2)`. The child's only work before `execvp` is
/// async-signal-safe (`sched_setaffinity`, `ptrace`, `execvp` itself),
/// per the `nix::unistd::fork` safety contract.
pub unsafe fn spawn_traced(argv: &[String]) -> EngineResult<Pid> {
    assert!(!argv.is_empty(), "argv must include the program path");

    match fork().map_err(EngineError::PtraceIo)? {
        ForkResult::Parent { child } => {
            affinity::pin_current_process().map_err(EngineError::PtraceIo)?;
            Ok(child)
        }
        ForkResult::Child => {
            if affinity::pin_current_process().is_err() {
                std::process::exit(127);
            }
            if ptrace::traceme().is_err() {
                std::process::exit(127);
            }
            let cargs: Vec<CString> = argv
                .iter()
                .map(|s| CString::new(s.as_str()).expect("argv entry contains a NUL byte"))
                .collect();
            // execvp only returns on failure.
            let _ = execvp(&cargs[0], &cargs);
            std::process::exit(127);
        }
    }
}
