//! Per-phase bookkeeping: block counters, error counts and timing.

use crate::{
    error::CapacityDiscrepancy,
    metadata::{Capacity, BLOCK_SIZE},
    timing::{TimeDelta, Timestamp},
};
use std::fmt;
use tracing::{info, warn};

const MIB: f64 = 1_048_576.0;
const MB: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Write,
    Read,
}

impl Phase {
    fn past_tense(self) -> &'static str {
        match self {
            Phase::Write => "wrote",
            Phase::Read => "read",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Write => write!(f, "write"),
            Phase::Read => write!(f, "read"),
        }
    }
}

/// Sustained sequential speed of a phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Throughput {
    pub mib_per_sec: f64,
    pub mb_per_sec: f64,
}

/// Accumulates wall-clock time spent on the chunks of one phase.
#[derive(Debug, Clone)]
pub(crate) struct PerformanceTracker {
    started: Timestamp,
    chunks: u64,
    pub elapsed_total: f64,
    /// Shortest chunk seen so far; `None` until the first chunk completes.
    pub elapsed_min: Option<f64>,
    pub elapsed_max: f64,
}

impl PerformanceTracker {
    pub(crate) fn new(started: Timestamp) -> Self {
        Self {
            started,
            chunks: 0,
            elapsed_total: 0.0,
            elapsed_min: None,
            elapsed_max: 0.0,
        }
    }

    /// Accounts for a chunk that finished at `now`. Returns the chunk's own duration, or `None`
    /// if the clock appears to have gone backwards.
    pub(crate) fn record_chunk(&mut self, now: Timestamp) -> Option<f64> {
        let delta = TimeDelta::between(now, self.started);
        if delta.negative {
            warn!(?now, started = ?self.started, "Monotonic clock went backwards; ignoring chunk timing");
            return None;
        }
        let total = delta.as_secs_f64();
        let chunk = total - self.elapsed_total;
        self.elapsed_total = total;
        self.elapsed_min = Some(self.elapsed_min.map_or(chunk, |min| min.min(chunk)));
        self.elapsed_max = self.elapsed_max.max(chunk);
        self.chunks += 1;
        Some(chunk)
    }

    pub(crate) fn chunks(&self) -> u64 {
        self.chunks
    }

    pub(crate) fn elapsed_avg(&self) -> f64 {
        if self.chunks == 0 {
            0.0
        } else {
            self.elapsed_total / self.chunks as f64
        }
    }

    pub(crate) fn throughput(&self, bytes: u64) -> Throughput {
        if self.elapsed_total <= 0.0 {
            return Throughput::default();
        }
        Throughput {
            mib_per_sec: bytes as f64 / MIB / self.elapsed_total,
            mb_per_sec: bytes as f64 / MB / self.elapsed_total,
        }
    }
}

/// Statistics for one phase (write or read) of a test run.
#[derive(Debug, Clone)]
pub(crate) struct PhaseStats {
    pub phase: Phase,
    pub bytes_claimed: u64,
    pub blocks_claimed: u64,
    /// Block counter. Starts at the first tested block, so it is an absolute block index.
    pub blocks_actual: u64,
    pub block_size: usize,
    pub error_count: u32,
    pub perf: PerformanceTracker,
}

impl PhaseStats {
    pub(crate) fn start(phase: Phase, capacity: &Capacity, first_block: u64) -> Self {
        Self {
            phase,
            bytes_claimed: capacity.bytes_claimed,
            blocks_claimed: capacity.blocks_claimed,
            blocks_actual: first_block,
            block_size: BLOCK_SIZE,
            error_count: 0,
            perf: PerformanceTracker::new(Timestamp::now()),
        }
    }

    pub(crate) fn bytes_actual(&self) -> u64 {
        self.blocks_actual * self.block_size as u64
    }

    pub(crate) fn throughput(&self) -> Throughput {
        self.perf.throughput(self.bytes_actual())
    }

    /// Reports a size mismatch, unless the run was deliberately limited.
    pub(crate) fn discrepancy(&self, block_limit: Option<u64>) -> Option<CapacityDiscrepancy> {
        if block_limit.is_some() || self.blocks_actual == self.blocks_claimed {
            return None;
        }
        Some(CapacityDiscrepancy {
            bytes_claimed: self.bytes_claimed,
            bytes_actual: self.bytes_actual(),
            verb: self.phase.past_tense(),
        })
    }

    /// Emits a per-chunk progress line.
    pub(crate) fn log_progress(&self) {
        let Throughput {
            mib_per_sec,
            mb_per_sec,
        } = self.throughput();
        info!(
            phase = %self.phase,
            block = self.blocks_actual,
            mib = self.bytes_actual() as f64 / MIB,
            mib_per_sec,
            mb = self.bytes_actual() as f64 / MB,
            mb_per_sec,
            "Progress"
        );
    }

    /// Emits the end-of-phase summary, including any capacity discrepancy.
    pub(crate) fn log_summary(&self, block_limit: Option<u64>) {
        let Throughput {
            mib_per_sec,
            mb_per_sec,
        } = self.throughput();
        info!(
            phase = %self.phase,
            blocks = self.blocks_actual,
            block_size = self.block_size,
            mib = self.bytes_actual() as f64 / MIB,
            mb = self.bytes_actual() as f64 / MB,
            seconds = self.perf.elapsed_total,
            mib_per_sec,
            mb_per_sec,
            chunks = self.perf.chunks(),
            chunk_min = self.perf.elapsed_min.unwrap_or_default(),
            chunk_avg = self.perf.elapsed_avg(),
            chunk_max = self.perf.elapsed_max,
            errors = self.error_count,
            "{} {} blocks of {} bytes in {:.3} seconds ({:.2} MiB/s, {:.2} MB/s)",
            self.phase.past_tense(),
            self.blocks_actual,
            self.block_size,
            self.perf.elapsed_total,
            mib_per_sec,
            mb_per_sec,
        );
        if let Some(discrepancy) = self.discrepancy(block_limit) {
            warn!(phase = %self.phase, "Error: {}", discrepancy);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tracks_chunk_extremes() {
        let mut perf = PerformanceTracker::new(Timestamp::new(10, 0));
        assert_eq!(perf.record_chunk(Timestamp::new(11, 0)), Some(1.0));
        assert_eq!(perf.record_chunk(Timestamp::new(11, 500_000_000)), Some(0.5));
        assert_eq!(perf.record_chunk(Timestamp::new(14, 0)), Some(2.5));
        assert_eq!(perf.elapsed_total, 4.0);
        assert_eq!(perf.elapsed_min, Some(0.5));
        assert_eq!(perf.elapsed_max, 2.5);
        assert_eq!(perf.chunks(), 3);
        assert!((perf.elapsed_avg() - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn ignores_clock_anomalies() {
        let mut perf = PerformanceTracker::new(Timestamp::new(10, 0));
        assert_eq!(perf.record_chunk(Timestamp::new(9, 0)), None);
        assert_eq!(perf.chunks(), 0);
        assert_eq!(perf.elapsed_min, None);
    }

    #[test]
    fn throughput_guards_against_zero_time() {
        let perf = PerformanceTracker::new(Timestamp::new(0, 0));
        assert_eq!(perf.throughput(1 << 20), Throughput::default());

        let mut perf = PerformanceTracker::new(Timestamp::new(0, 0));
        perf.record_chunk(Timestamp::new(2, 0));
        let speed = perf.throughput(4 * 1_048_576);
        assert_eq!(speed.mib_per_sec, 2.0);
        assert_eq!(speed.mb_per_sec, 4.0 * 1.048576 / 2.0);
    }

    #[test]
    fn discrepancy_only_without_limit() {
        let capacity = Capacity::from_bytes(512 * 100);
        let mut stats = PhaseStats::start(Phase::Write, &capacity, 0);
        stats.blocks_actual = 60;
        let discrepancy = stats.discrepancy(None).expect("sizes differ");
        assert_eq!(discrepancy.bytes_actual, 60 * 512);
        assert_eq!(
            discrepancy.to_string(),
            "Target size: 51200 bytes, wrote 30720 bytes"
        );
        assert_eq!(stats.discrepancy(Some(60)), None);
        stats.blocks_actual = 100;
        assert_eq!(stats.discrepancy(None), None);
    }
}
