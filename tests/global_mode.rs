//! End-to-end global-mode scenario (spec §8 scenario 1): `/bin/true`,
//! no region configured, no timeout. Exercises the full public API
//! including startup (`fork`+`traceme`+`exec`), not just the state
//! machine.

use perfregion::counters::NullEvents;
use perfregion::engine::{self, Mode, TerminationReason};
use perfregion::report::TableFormatter;

#[test]
fn natural_exit_produces_exactly_one_sample() {
    let argv = vec!["/bin/true".to_string()];
    let mut out = Vec::new();
    let mut formatter = TableFormatter::new(&mut out);

    let reason = engine::run(
        Mode::Global { timeout_seconds: None },
        &argv,
        NullEvents,
        &mut formatter,
    )
    .expect("engine run");

    assert!(matches!(reason, TerminationReason::Completed));
    assert_eq!(reason.exit_status(), 0);

    let text = String::from_utf8(out).unwrap();
    // Exactly one header line and one sample row.
    assert_eq!(text.lines().count(), 2);
}
