//! CPU pinning (spec §4.4.1 step 1, resolved against `main.c`: both the
//! parent and the child pin themselves to the same CPU immediately after
//! `fork`, before either branches on its role).

use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;

/// The CPU the original tool hard-codes (spec Glossary "pinned CPU").
pub const PINNED_CPU: usize = 1;

/// Pins the calling process (pid 0 means "self" to `sched_setaffinity`)
/// to [`PINNED_CPU`]. Call this from both sides of `fork`, before the
/// child execs and before the parent starts tracing, so that neither the
/// tracer's nor the tracee's counters are perturbed by migration.
pub fn pin_current_process() -> nix::Result<()> {
    let mut set = CpuSet::new();
    set.set(PINNED_CPU)?;
    sched_setaffinity(Pid::from_raw(0), &set)
}
