//! C2: the PMU counter provider (spec §2, §4.2).

pub mod linux;

use nix::unistd::Pid;

use crate::error::EngineResult;
use crate::sample::CounterVector;

/// The fixed, ordered set of hardware events sampled on every run. The
/// engine treats the vector as opaque; only this module and the report
/// formatter know the column identities.
pub const EVENT_COUNT: usize = 5;

/// Seam between the engine and whatever reads hardware counters. Spec §2
/// singles this out as the component most likely to need a non-Linux or
/// mocked backend, so it is a trait rather than a concrete type threaded
/// everywhere.
pub trait EventsProvider {
    /// Opens and configures the counter group for `pid`, in the disabled
    /// state. Must be called once, after the tracee has stopped at its
    /// initial `execve` trap and before any region is entered.
    fn configure(&mut self, pid: Pid) -> EngineResult<()>;

    /// Resets and enables the group, then reads the (should-be-zero)
    /// starting values. Called at the begin-breakpoint.
    fn begin(&mut self) -> EngineResult<CounterVector>;

    /// Reads the current values and disables the group. Called at the
    /// end-breakpoint.
    fn end(&mut self) -> EngineResult<CounterVector>;
}

/// A no-op provider returning all-zero vectors of the right width. Used
/// by integration tests that exercise the ptrace/breakpoint machinery on
/// hosts where `perf_event_open` is unavailable or unprivileged (spec §8:
/// PMU-dependent scenarios are "verified by construction" in CI).
#[derive(Default)]
pub struct NullEvents;

impl EventsProvider for NullEvents {
    fn configure(&mut self, _pid: Pid) -> EngineResult<()> {
        Ok(())
    }

    fn begin(&mut self) -> EngineResult<CounterVector> {
        Ok(vec![0; EVENT_COUNT])
    }

    fn end(&mut self) -> EngineResult<CounterVector> {
        Ok(vec![0; EVENT_COUNT])
    }
}
