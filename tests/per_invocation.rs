//! End-to-end per-invocation mode scenarios (spec §8 scenarios 3, 4, 6),
//! driven against a real traced child via real ptrace, using
//! [`perfregion::counters::NullEvents`] so the test has no dependency on
//! `perf_event_open` permissions.

mod common;

use perfregion::buffer::SampleBuffer;
use perfregion::counters::NullEvents;
use perfregion::engine::{self, per_invocation, TerminationReason};
use perfregion::report::TableFormatter;

fn count_rows(report: &[u8]) -> usize {
    // One header line plus one line per sample; the fixture's
    // `TableFormatter` never emits a header on an empty batch.
    String::from_utf8_lossy(report).lines().count()
}

#[test]
fn loop_of_five_produces_five_samples() {
    let fixture = common::spawn_fixture(5);
    let mut counters = NullEvents;
    let mut buffer = SampleBuffer::new();
    let mut out = Vec::new();
    let mut formatter = TableFormatter::new(&mut out);

    let reason = per_invocation::run(
        fixture.pid,
        &mut counters,
        &mut buffer,
        &mut formatter,
        fixture.addr_start,
        fixture.addr_end,
        u32::MAX,
    )
    .expect("engine run");

    assert!(matches!(reason, TerminationReason::Completed));
    assert_eq!(buffer.sample_count(), 5);
    assert_eq!(buffer.flushed_count(), 5);
    // header + 5 rows.
    assert_eq!(count_rows(&out), 6);
}

#[test]
fn max_samples_cap_stops_the_tracee_early() {
    let fixture = common::spawn_fixture(100);
    let mut counters = NullEvents;
    let mut buffer = SampleBuffer::new();
    let mut out = Vec::new();
    let mut formatter = TableFormatter::new(&mut out);

    let reason = per_invocation::run(
        fixture.pid,
        &mut counters,
        &mut buffer,
        &mut formatter,
        fixture.addr_start,
        fixture.addr_end,
        10,
    )
    .expect("engine run");

    assert!(matches!(reason, TerminationReason::Completed));
    assert_eq!(buffer.sample_count(), 10);
}

#[test]
fn buffer_overflow_flushes_in_batches() {
    let fixture = common::spawn_fixture(9);
    let mut counters = NullEvents;
    let mut buffer = SampleBuffer::with_capacity(4);
    let mut out = Vec::new();
    let mut formatter = TableFormatter::new(&mut out);

    engine::per_invocation::run(
        fixture.pid,
        &mut counters,
        &mut buffer,
        &mut formatter,
        fixture.addr_start,
        fixture.addr_end,
        u32::MAX,
    )
    .expect("engine run");

    assert_eq!(buffer.sample_count(), 9);
    assert_eq!(buffer.flushed_count(), 9);
    // One header line, emitted only on the first of the three flushes
    // (4 + 4 + 1 samples), plus 9 sample rows.
    assert_eq!(count_rows(&out), 10);
}
