//! Per-invocation mode (spec §4.4.3): one sample per dynamic entry into
//! `[addr_start, addr_end)`, with a single alternating "cursor"
//! breakpoint so the tracee can never re-enter the region mid-measurement.

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::breakpoint::{rewind_after_trap, Breakpoint, PtraceMemory};
use crate::buffer::SampleBuffer;
use crate::counters::EventsProvider;
use crate::error::{log_output_io, EngineError, EngineResult};
use crate::report::SampleFormatter;

use super::{cont, finalize_on_signal, wait_for_tracee, TerminationReason, WaitOutcome};

enum Phase {
    AwaitingStart,
    AwaitingEnd,
}

/// Runs per-invocation mode, then — per spec §7's `PtraceIO`/
/// `PmuUnavailable` mid-run policy — flushes whatever samples are
/// already closed before propagating a fatal error.
#[allow(clippy::too_many_arguments)]
pub fn run<E: EventsProvider>(
    tracee: Pid,
    counters: &mut E,
    buffer: &mut SampleBuffer,
    formatter: &mut dyn SampleFormatter,
    addr_start: u64,
    addr_end: u64,
    max_samples: u32,
) -> EngineResult<TerminationReason> {
    let result = drive(tracee, counters, buffer, formatter, addr_start, addr_end, max_samples);
    if let Err(ref e @ (EngineError::PtraceIo(_) | EngineError::PmuUnavailable(_))) = result {
        log::error!("per-invocation sampling failed mid-run: {e}");
        if let Err(flush_err) = buffer.final_flush(formatter) {
            log_output_io("final flush after mid-run error", flush_err);
        }
    }
    result
}

#[allow(clippy::too_many_arguments)]
fn drive<E: EventsProvider>(
    tracee: Pid,
    counters: &mut E,
    buffer: &mut SampleBuffer,
    formatter: &mut dyn SampleFormatter,
    addr_start: u64,
    addr_end: u64,
    max_samples: u32,
) -> EngineResult<TerminationReason> {
    let mem = PtraceMemory(tracee);
    let mut bp = Breakpoint::install(&mem, addr_start).map_err(EngineError::PtraceIo)?;
    cont(tracee, None)?;

    let mut phase = Phase::AwaitingStart;
    let mut sample_in_progress = false;

    loop {
        match wait_for_tracee(tracee)? {
            WaitOutcome::Terminating(sig) => {
                return finalize_on_signal(sig, tracee, counters, buffer, formatter, sample_in_progress);
            }

            WaitOutcome::Stopped(WaitStatus::Exited(..)) | WaitOutcome::Stopped(WaitStatus::Signaled(..)) => {
                // Tracee exited at `[at start]` (or mid-region): the
                // in-progress sample's begin side, if any, is discarded
                // rather than counted (spec §4.4.3 tie-break).
                if sample_in_progress {
                    buffer.discard_current();
                }
                if let Err(e) = buffer.final_flush(formatter) {
                    log_output_io("final flush at tracee exit", e);
                }
                return Ok(TerminationReason::Completed);
            }

            WaitOutcome::Stopped(WaitStatus::Stopped(_, Signal::SIGTRAP)) => {
                rewind_after_trap(tracee).map_err(EngineError::PtraceIo)?;

                match phase {
                    Phase::AwaitingStart => {
                        bp.remove(&mem).map_err(EngineError::PtraceIo)?;
                        bp = Breakpoint::install(&mem, addr_end).map_err(EngineError::PtraceIo)?;

                        let begin = counters.begin()?;
                        buffer.begin_next(begin);
                        sample_in_progress = true;
                        phase = Phase::AwaitingEnd;
                    }
                    Phase::AwaitingEnd => {
                        bp.remove(&mem).map_err(EngineError::PtraceIo)?;

                        let end = counters.end()?;
                        buffer.close_current(end);
                        sample_in_progress = false;

                        if let Err(e) = buffer.maybe_flush(formatter) {
                            log_output_io("periodic flush", e);
                        }

                        if buffer.sample_count() == max_samples as u64 {
                            let _ = kill(tracee, Signal::SIGKILL);
                            let _ = waitpid(tracee, None);
                            if let Err(e) = buffer.final_flush(formatter) {
                                log_output_io("final flush at max_samples", e);
                            }
                            return Ok(TerminationReason::Completed);
                        }

                        bp = Breakpoint::install(&mem, addr_start).map_err(EngineError::PtraceIo)?;
                        phase = Phase::AwaitingStart;
                    }
                }

                cont(tracee, None)?;
            }

            WaitOutcome::Stopped(WaitStatus::Stopped(_, other_sig)) => {
                // Not the region's own trap: forward it untouched and
                // do not count it as a sample event (spec §4.4.3).
                cont(tracee, Some(other_sig))?;
            }

            WaitOutcome::Stopped(_) => {
                cont(tracee, None)?;
            }
        }
    }
}
