//! Dispatch and lookup of deferred units of work.
//!
//! [`WorkCoordinator`] ties the [`Sequencer`], [`ResultStore`],
//! [`StatsTracker`] and [`DrainController`] together. Each call to
//! [`WorkCoordinator::dispatch`] issues an identifier and spawns one Tokio task
//! that sleeps for the configured delay, applies the [`Transform`] and
//! publishes the output. The caller gets the identifier back without waiting
//! for any of that.
//!
//! ## Lifecycle of a unit
//!
//! 1. The start instant is taken.
//! 2. The unit registers with the drain controller. This happens before the
//!    identifier is issued, so a concurrent drain can never observe the
//!    system as idle while a unit is about to launch.
//! 3. The identifier is issued and the task spawned.
//! 4. On success the output is stored, then the latency is recorded.
//! 5. On failure the error is logged and the identifier stays absent.
//! 6. The drain guard is dropped on every exit path, including panics. A unit
//!    that never reached step 4 or 5 reports itself as abandoned.

mod observer;


pub use observer::*;

use crate::{
    DrainController, Error, HashId, Result, ResultStore, Sequencer, Sha512Base64, Snapshot,
    StatsTracker, Transform, UnitGuard, store::DEFAULT_SHARDS,
};
use bytes::Bytes;
use core::time::Duration;
use std::sync::Arc;
use tokio::time::Instant;

/// Default processing delay applied before each transform.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Orchestrates deferred units of work and serves their results.
///
/// All state is owned by the coordinator and shared with running units through
/// [`Arc`]s. There is no lock spanning components: the store and the tracker
/// each guard their own invariants.
pub struct WorkCoordinator {
    sequencer: Sequencer,
    store: Arc<ResultStore>,
    stats: Arc<StatsTracker>,
    drain: DrainController,
    transform: Arc<dyn Transform>,
    observer: Arc<dyn Observer>,
    delay: Duration,
}

impl core::fmt::Debug for WorkCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkCoordinator")
            .field("last_issued", &self.sequencer.last_issued())
            .field("stats", &self.stats.snapshot())
            .field("outstanding", &self.drain.outstanding())
            .field("draining", &self.drain.is_draining())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl Default for WorkCoordinator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl WorkCoordinator {
    /// Coordinator with the default delay, shard count and SHA-512 transform.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> WorkCoordinatorBuilder {
        WorkCoordinatorBuilder::default()
    }

    /// Accepts `input` for deferred processing and returns its identifier
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty input. No identifier is
    /// issued in that case. Returns [`Error::Exhausted`] once the identifier
    /// space is used up; nothing is spawned then.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub fn dispatch(&self, input: impl Into<Bytes>) -> Result<HashId> {
        let input = input.into();
        if input.is_empty() {
            return Err(Error::InvalidInput {
                reason: "input must not be empty".to_string(),
            });
        }

        let start = Instant::now();
        let guard = self.drain.register_start();
        let id = self.sequencer.next_id()?;

        let unit = Unit {
            id,
            input,
            start,
            delay: self.delay,
            store: Arc::clone(&self.store),
            stats: Arc::clone(&self.stats),
            transform: Arc::clone(&self.transform),
            observer: Arc::clone(&self.observer),
            settled: false,
            _guard: guard,
        };

        self.observer.on_dispatch(id);

        let fut = unit.run();
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("unit", %id))
        };
        tokio::spawn(fut);

        #[cfg(feature = "tracing")]
        tracing::debug!(%id, "Dispatched unit");

        Ok(id)
    }

    /// Returns the output stored for `id`, or `None` while the unit is pending,
    /// after its transform failed, or if `id` was never issued.
    pub fn lookup(&self, id: HashId) -> Option<String> {
        self.store.get(id)
    }

    /// Like [`Self::lookup`], reporting absence as [`Error::NotFound`].
    pub fn fetch(&self, id: HashId) -> Result<String> {
        self.lookup(id).ok_or(Error::NotFound { id })
    }

    pub fn stats(&self) -> Snapshot {
        self.stats.snapshot()
    }

    /// Units dispatched but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.drain.outstanding()
    }

    pub fn is_draining(&self) -> bool {
        self.drain.is_draining()
    }

    pub fn drain(&self) -> &DrainController {
        &self.drain
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Begins draining and waits until every dispatched unit has published
    /// its result (or failed).
    pub async fn shutdown(&self) {
        self.drain.begin_drain_and_wait().await;
    }
}

/// Configures a [`WorkCoordinator`].
pub struct WorkCoordinatorBuilder {
    delay: Duration,
    shards: usize,
    start_after: u64,
    transform: Arc<dyn Transform>,
    observer: Arc<dyn Observer>,
}

impl Default for WorkCoordinatorBuilder {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            shards: DEFAULT_SHARDS,
            start_after: 0,
            transform: Arc::new(Sha512Base64),
            observer: Arc::new(NoopObserver),
        }
    }
}

impl WorkCoordinatorBuilder {
    /// Processing delay applied inside every unit before the transform.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Result store shard count, rounded up to a power of two.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// The first issued identifier will be `last + 1`.
    pub fn start_after(mut self, last: u64) -> Self {
        self.start_after = last;
        self
    }

    pub fn transform(mut self, transform: impl Transform) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    pub fn observer(mut self, observer: impl Observer) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn build(self) -> WorkCoordinator {
        WorkCoordinator {
            sequencer: Sequencer::starting_after(self.start_after),
            store: Arc::new(ResultStore::with_shards(self.shards)),
            stats: Arc::new(StatsTracker::new()),
            drain: DrainController::new(),
            transform: self.transform,
            observer: self.observer,
            delay: self.delay,
        }
    }
}

/// One deferred computation. Owns its drain guard, so the unit deregisters
/// when this value is dropped, whether `run` returns or unwinds.
struct Unit {
    id: HashId,
    input: Bytes,
    start: Instant,
    delay: Duration,
    store: Arc<ResultStore>,
    stats: Arc<StatsTracker>,
    transform: Arc<dyn Transform>,
    observer: Arc<dyn Observer>,
    settled: bool,
    _guard: UnitGuard,
}

impl Unit {
    async fn run(mut self) {
        tokio::time::sleep(self.delay).await;

        match self.transform.apply(&self.input) {
            Ok(output) => {
                self.store.put(self.id, output);
                let elapsed = self.start.elapsed();
                let _average = self.stats.record_elapsed(elapsed);
                self.observer.on_complete(self.id, elapsed);

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    elapsed_us = elapsed.as_micros() as u64,
                    average_us = _average,
                    "Unit completed"
                );
            }
            Err(e) => {
                let err = Error::from(e);
                #[cfg(feature = "tracing")]
                tracing::error!(id = %self.id, "Unit failed, result will stay absent: {err}");
                self.observer.on_failure(self.id, &err);
            }
        }
        self.settled = true;
    }
}

impl Drop for Unit {
    fn drop(&mut self) {
        if !self.settled {
            #[cfg(feature = "tracing")]
            tracing::error!(id = %self.id, "Unit abandoned before completing");
            self.observer.on_abandon(self.id);
        }
    }
}
