//! Running latency statistics across completed units of work.
//!
//! The tracker keeps a count and an exact floating-point mean behind a single
//! lock. Each completion folds one sample into the mean with the incremental
//! formula `mean' = (mean * n + x) / (n + 1)`, so no sample history is kept.
//!
//! The public average is the exact mean rounded to the nearest microsecond,
//! with halves rounded away from zero ([`f64::round`]).

use core::time::Duration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A point-in-time view of the statistics.
///
/// Serializes as `{"total": <completed>, "average": <micros>}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of completed units.
    pub total: u64,
    /// Mean latency in microseconds, rounded to the nearest integer.
    pub average: u64,
}

#[derive(Debug, Default)]
struct Running {
    count: u64,
    mean: f64,
}

impl Running {
    fn rounded(&self) -> u64 {
        // Latencies are non-negative, so the cast never saturates below zero.
        self.mean.round() as u64
    }
}

/// Thread-safe accumulator of completion latencies.
#[derive(Debug, Default)]
pub struct StatsTracker {
    inner: Mutex<Running>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one latency sample into the running mean and returns the updated
    /// rounded average.
    pub fn record_completion(&self, latency_micros: u64) -> u64 {
        let mut running = self.inner.lock();
        let n = running.count as f64;
        running.mean = (running.mean * n + latency_micros as f64) / (n + 1.0);
        running.count += 1;
        running.rounded()
    }

    /// Like [`Self::record_completion`], for a measured [`Duration`].
    /// Durations beyond `u64::MAX` microseconds saturate.
    pub fn record_elapsed(&self, elapsed: Duration) -> u64 {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.record_completion(micros)
    }

    /// Returns the count and rounded average, read under the update lock.
    pub fn snapshot(&self) -> Snapshot {
        let running = self.inner.lock();
        Snapshot {
            total: running.count,
            average: running.rounded(),
        }
    }
}
