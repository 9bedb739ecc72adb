//! Library surface for the sampling engine. `main.rs` is a thin CLI
//! wrapper over this crate so the ptrace/PMU machinery is exercisable
//! from integration tests in `tests/` without re-forking the whole
//! process through a compiled binary.

pub mod affinity;
pub mod breakpoint;
pub mod buffer;
pub mod cli;
pub mod counters;
pub mod engine;
pub mod error;
pub mod launch;
pub mod report;
pub mod sample;
pub mod termination;
