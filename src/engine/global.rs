//! Global mode (spec §4.4.2): one sample spanning the whole run.

use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use crate::buffer::SampleBuffer;
use crate::counters::EventsProvider;
use crate::error::{log_output_io, EngineError, EngineResult};
use crate::report::SampleFormatter;
use crate::termination;

use super::{cont, finalize_on_signal, wait_for_tracee, TerminationReason, WaitOutcome};

/// Runs global mode, then — per spec §7's `PtraceIO`/`PmuUnavailable`
/// mid-run policy — flushes whatever samples are already closed before
/// propagating a fatal error, rather than losing them.
pub fn run<E: EventsProvider>(
    tracee: Pid,
    counters: &mut E,
    buffer: &mut SampleBuffer,
    formatter: &mut dyn SampleFormatter,
    timeout_seconds: Option<u32>,
) -> EngineResult<TerminationReason> {
    let result = drive(tracee, counters, buffer, formatter, timeout_seconds);
    if let Err(ref e @ (EngineError::PtraceIo(_) | EngineError::PmuUnavailable(_))) = result {
        log::error!("global-mode sampling failed mid-run: {e}");
        if let Err(flush_err) = buffer.final_flush(formatter) {
            log_output_io("final flush after mid-run error", flush_err);
        }
    }
    result
}

fn drive<E: EventsProvider>(
    tracee: Pid,
    counters: &mut E,
    buffer: &mut SampleBuffer,
    formatter: &mut dyn SampleFormatter,
    timeout_seconds: Option<u32>,
) -> EngineResult<TerminationReason> {
    let begin = counters.begin()?;
    buffer.begin_next(begin);
    cont(tracee, None)?;
    termination::arm_timeout(timeout_seconds);

    loop {
        match wait_for_tracee(tracee)? {
            WaitOutcome::Terminating(sig) => {
                return finalize_on_signal(sig, tracee, counters, buffer, formatter, true);
            }
            WaitOutcome::Stopped(WaitStatus::Exited(..)) | WaitOutcome::Stopped(WaitStatus::Signaled(..)) => {
                let end = counters.end()?;
                buffer.close_current(end);
                if let Err(e) = buffer.final_flush(formatter) {
                    log_output_io("final flush at natural exit", e);
                }
                return Ok(TerminationReason::Completed);
            }
            WaitOutcome::Stopped(WaitStatus::Stopped(_, sig)) => {
                // Global mode has no breakpoints to service; any
                // trace-stop is a tracee-originated signal we are not
                // otherwise interested in, so it is simply forwarded.
                cont(tracee, Some(sig))?;
            }
            WaitOutcome::Stopped(_) => {
                cont(tracee, None)?;
            }
        }
    }
}
