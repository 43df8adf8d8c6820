//! Nanosecond-precision timestamps on a monotonic clock.

use std::time::{Duration, Instant};

pub(crate) const NANOS_PER_SEC: i64 = 1_000_000_000;

lazy_static! {
    static ref CLOCK_ORIGIN: Instant = Instant::now();
}

/// A point on the monotonic clock, or a span between two of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Timestamp {
    pub secs: i64,
    pub nanos: i64,
}

impl Timestamp {
    pub(crate) fn new(secs: i64, nanos: i64) -> Self {
        Self { secs, nanos }
    }

    /// The current reading of the process-wide monotonic clock.
    pub(crate) fn now() -> Self {
        Self::from(CLOCK_ORIGIN.elapsed())
    }

    pub(crate) fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.nanos as f64 / NANOS_PER_SEC as f64
    }
}

impl From<Duration> for Timestamp {
    fn from(d: Duration) -> Self {
        Self {
            secs: d.as_secs() as i64,
            nanos: i64::from(d.subsec_nanos()),
        }
    }
}

/// The difference `end - start` between two timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeDelta {
    /// Normalized so that `0 <= nanos < NANOS_PER_SEC`.
    pub elapsed: Timestamp,
    /// Set when `end` lies before `start`.
    pub negative: bool,
}

impl TimeDelta {
    pub(crate) fn between(end: Timestamp, start: Timestamp) -> Self {
        let mut start = start;
        // Carry into start's seconds so the nanosecond subtraction can't go below zero...
        if end.nanos < start.nanos {
            let carry = (start.nanos - end.nanos) / NANOS_PER_SEC + 1;
            start.nanos -= NANOS_PER_SEC * carry;
            start.secs += carry;
        }
        // ...or reach a whole second.
        if end.nanos - start.nanos >= NANOS_PER_SEC {
            let carry = (end.nanos - start.nanos) / NANOS_PER_SEC;
            start.nanos += NANOS_PER_SEC * carry;
            start.secs -= carry;
        }
        Self {
            elapsed: Timestamp::new(end.secs - start.secs, end.nanos - start.nanos),
            negative: end.secs < start.secs,
        }
    }

    pub(crate) fn as_secs_f64(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}
