//! C4: the sample ring and its flush policy (spec §3, §4.3).

use std::io;

use crate::report::SampleFormatter;
use crate::sample::{CounterVector, Sample};

/// Default ring capacity (`CAP` in spec §3). Overridable via
/// [`SampleBuffer::with_capacity`], mainly so tests can exercise the flush
/// boundary without allocating thousands of samples.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Fixed-capacity ring of closed sample records with periodic flush.
///
/// Invariants (spec §3): `flushed_count <= sample_count`; `sample_count -
/// flushed_count <= cap`; `flushed_count` is always a multiple of `cap`
/// after any flush; the buffer flushes and logically empties as soon as it
/// reaches `cap`.
pub struct SampleBuffer {
    cap: usize,
    flushed_count: u64,
    /// Closed samples not yet flushed. `closed.len() == sample_count -
    /// flushed_count` at every observable point, since a sample only
    /// enters `sample_count` once it is closed (an in-progress sample
    /// lives in `current`, uncounted, until then).
    closed: Vec<Sample>,
    current: Option<Sample>,
    headers_emitted: bool,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(cap: usize) -> Self {
        assert!(cap > 0, "SampleBuffer capacity must be positive");
        SampleBuffer {
            cap,
            flushed_count: 0,
            closed: Vec::with_capacity(cap),
            current: None,
            headers_emitted: false,
        }
    }

    pub fn sample_count(&self) -> u64 {
        self.flushed_count + self.closed.len() as u64
    }

    pub fn flushed_count(&self) -> u64 {
        self.flushed_count
    }

    pub fn is_sample_in_progress(&self) -> bool {
        self.current.is_some()
    }

    pub fn headers_emitted(&self) -> bool {
        self.headers_emitted
    }

    /// Opens the next sample's begin-side counters. Panics if a sample is
    /// already in progress or the ring is full — both indicate a driver
    /// bug, not a runtime condition (the driver always flushes before the
    /// ring reaches capacity and never opens two samples at once).
    pub fn begin_next(&mut self, begin: CounterVector) {
        assert!(
            self.closed.len() < self.cap,
            "begin_next called without a prior flush"
        );
        assert!(
            self.current.is_none(),
            "begin_next called while a sample is already in progress"
        );
        self.current = Some(Sample::open(begin));
    }

    /// Finalizes the in-progress sample with its end-side counters and
    /// counts it towards `sample_count`.
    pub fn close_current(&mut self, end: CounterVector) {
        let mut sample = self
            .current
            .take()
            .expect("close_current called with no sample in progress");
        sample.close(end);
        self.closed.push(sample);
    }

    /// Discards the in-progress sample's begin-side counters without
    /// counting it (spec §4.4.3: tracee exits at `[at start]` before
    /// reaching `end`).
    pub fn discard_current(&mut self) {
        self.current = None;
    }

    /// Closes the in-progress sample using counters read from the
    /// tracer's own viewpoint (used by the termination path, spec
    /// §4.4.4 step 2).
    pub fn close_current_from(&mut self, end: CounterVector) {
        self.close_current(end);
    }

    /// Flushes a full batch to `formatter` if the ring has reached
    /// capacity; otherwise a no-op.
    pub fn maybe_flush(&mut self, formatter: &mut dyn SampleFormatter) -> io::Result<()> {
        if self.closed.len() == self.cap {
            self.flush_closed(formatter)?;
        }
        Ok(())
    }

    /// Flushes whatever remains, regardless of batch size. Called once at
    /// engine shutdown (and by the termination path before exiting).
    pub fn final_flush(&mut self, formatter: &mut dyn SampleFormatter) -> io::Result<()> {
        if !self.closed.is_empty() {
            self.flush_closed(formatter)?;
        }
        Ok(())
    }

    fn flush_closed(&mut self, formatter: &mut dyn SampleFormatter) -> io::Result<()> {
        let headers = !self.headers_emitted;
        formatter.flush(&self.closed, headers)?;
        self.headers_emitted = true;
        self.flushed_count += self.closed.len() as u64;
        self.closed.clear();
        Ok(())
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
