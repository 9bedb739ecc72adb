//! C5: the tracing driver (spec §4.4). Owns the single ptrace wait loop
//! and dispatches to [`global`] or [`per_invocation`] depending on
//! whether a region was configured.

pub mod global;
pub mod per_invocation;

use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::buffer::SampleBuffer;
use crate::counters::EventsProvider;
use crate::error::{log_output_io, EngineError, EngineResult};
use crate::report::SampleFormatter;
use crate::termination;

/// Selects which of the two driver state machines runs (spec §6: region
/// addresses both present and nonzero selects per-invocation mode).
pub enum Mode {
    Global { timeout_seconds: Option<u32> },
    PerInvocation {
        addr_start: u64,
        addr_end: u64,
        max_samples: u32,
    },
}

/// Why the driver's top-level loop stopped. Not an error: a delivered
/// termination signal (spec §7 `ExternalSignal`) is a control-flow path,
/// not a `Result::Err` (see [`crate::error`]).
pub enum TerminationReason {
    Completed,
    Signal(Signal),
}

impl TerminationReason {
    /// The process exit status spec §6 calls for: zero on normal
    /// completion, a distinguished nonzero value when C6 intervened.
    pub fn exit_status(&self) -> i32 {
        match self {
            TerminationReason::Completed => 0,
            TerminationReason::Signal(_) => 130,
        }
    }
}

/// Outcome of one `waitpid` round, after the termination flag has
/// already been checked (spec §4.4.4: checked "immediately after every
/// `waitpid` call returns, whether it returned normally or with
/// `EINTR`").
pub(crate) enum WaitOutcome {
    Stopped(WaitStatus),
    Terminating(Signal),
}

/// Blocks for the tracee's next stop, looping through `EINTR` (no
/// `SA_RESTART` is set on the installed handlers) and surfacing a
/// pending termination signal as soon as one appears.
pub(crate) fn wait_for_tracee(tracee: Pid) -> EngineResult<WaitOutcome> {
    loop {
        match waitpid(tracee, None) {
            Ok(status) => {
                if let Some(sig) = termination::take_pending() {
                    return Ok(WaitOutcome::Terminating(sig));
                }
                return Ok(WaitOutcome::Stopped(status));
            }
            Err(nix::Error::EINTR) => {
                if let Some(sig) = termination::take_pending() {
                    return Ok(WaitOutcome::Terminating(sig));
                }
            }
            Err(e) => return Err(EngineError::PtraceIo(e)),
        }
    }
}

/// The signal-termination path (C6), spec §4.4.4 steps 1-5 minus step 1
/// (forwarding) which already happened inside the signal handler itself.
pub(crate) fn finalize_on_signal<E: EventsProvider>(
    sig: Signal,
    tracee: Pid,
    counters: &mut E,
    buffer: &mut SampleBuffer,
    formatter: &mut dyn SampleFormatter,
    sample_in_progress: bool,
) -> EngineResult<TerminationReason> {
    if sample_in_progress {
        let end = counters.end()?;
        buffer.close_current(end);
    }
    if let Err(e) = buffer.final_flush(formatter) {
        log_output_io("final flush on termination", e);
    }
    // Best-effort reap; the handler already forwarded `sig` to the
    // tracee so it is not expected to linger.
    let _ = waitpid(tracee, None);
    Ok(TerminationReason::Signal(sig))
}

/// Startup sequence (spec §4.4.1 steps 1-5): launch, wait for the
/// post-`execve` stop, configure counters, install termination handlers.
pub fn startup<E: EventsProvider>(argv: &[String], mut counters: E) -> EngineResult<(Pid, E)> {
    let tracee = unsafe { crate::launch::spawn_traced(argv)? };

    match waitpid(tracee, None) {
        Ok(WaitStatus::Stopped(_, Signal::SIGTRAP)) => {}
        Ok(other) => {
            return Err(EngineError::StartupFailure(format!(
                "tracee's initial stop was not the expected post-exec trap: {other:?}"
            )))
        }
        Err(e) => return Err(EngineError::PtraceIo(e)),
    }

    counters.configure(tracee)?;
    termination::install(tracee).map_err(EngineError::PtraceIo)?;

    Ok((tracee, counters))
}

/// Runs startup followed by whichever state machine `mode` selects.
pub fn run<E: EventsProvider>(
    mode: Mode,
    argv: &[String],
    counters: E,
    formatter: &mut dyn SampleFormatter,
) -> EngineResult<TerminationReason> {
    let (tracee, mut counters) = startup(argv, counters)?;
    let mut buffer = SampleBuffer::new();

    match mode {
        Mode::Global { timeout_seconds } => {
            global::run(tracee, &mut counters, &mut buffer, formatter, timeout_seconds)
        }
        Mode::PerInvocation {
            addr_start,
            addr_end,
            max_samples,
        } => per_invocation::run(
            tracee,
            &mut counters,
            &mut buffer,
            formatter,
            addr_start,
            addr_end,
            max_samples,
        ),
    }
}

pub(crate) fn cont(tracee: Pid, sig: Option<Signal>) -> EngineResult<()> {
    ptrace::cont(tracee, sig).map_err(EngineError::PtraceIo)
}
