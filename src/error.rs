//! Error taxonomy for the sampling engine (see spec §7).
//!
//! `ExternalSignal` is deliberately not a variant here: a delivered
//! termination signal is a control-flow path (see [`crate::termination`]),
//! not a `Result::Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start the tracee: {0}")]
    StartupFailure(String),

    #[error("hardware performance counters are unavailable: {0}")]
    PmuUnavailable(#[source] std::io::Error),

    #[error("ptrace I/O failed: {0}")]
    PtraceIo(#[from] nix::Error),

    #[error("tracee exited unexpectedly outside the terminal transition")]
    TraceeDied,
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// `OutputIO` (spec §7) is best-effort and never propagated as a hard
/// failure; callers log it via [`log::warn!`] and continue. This helper
/// centralizes that policy so call sites read as intent, not boilerplate.
pub fn log_output_io(context: &str, err: std::io::Error) {
    log::warn!("output sink error ({context}): {err}; continuing without it");
}
