//! Two-phase shutdown for outstanding units of work.
//!
//! A [`DrainController`] starts out [`DrainState::Accepting`]. Every unit of
//! work registers itself with [`DrainController::register_start`] and holds the
//! returned [`UnitGuard`] until it finishes; dropping the guard deregisters the
//! unit on every exit path, including panics.
//!
//! [`DrainController::begin_drain`] moves the controller to
//! [`DrainState::Draining`] exactly once, and [`DrainController::wait`]
//! resolves when draining has begun and no guard is alive. Waiting is done on
//! a [`TaskTracker`], never while holding a lock.
//!
//! The controller only counts. Refusing new work once draining begins is the
//! transport's job; [`DrainController::is_draining`] and
//! [`DrainController::draining`] exist for that.

use tokio_util::{
    sync::{CancellationToken, WaitForCancellationFuture},
    task::{TaskTracker, task_tracker::TaskTrackerToken},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainState {
    Accepting,
    /// Terminal.
    Draining,
}

/// Tracks outstanding units of work and blocks shutdown until they finish.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone, Debug, Default)]
pub struct DrainController {
    tracker: TaskTracker,
    draining: CancellationToken,
}

/// Registration of one outstanding unit. Dropping it completes the unit.
#[derive(Debug)]
#[must_use = "dropping the guard immediately completes the unit"]
pub struct UnitGuard {
    _token: TaskTrackerToken,
}

impl UnitGuard {
    /// Completes the unit. Equivalent to dropping the guard.
    pub fn complete(self) {}
}

impl DrainController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one outstanding unit.
    ///
    /// Registration is still counted after draining began, so a drain never
    /// completes while a late unit is running.
    pub fn register_start(&self) -> UnitGuard {
        UnitGuard {
            _token: self.tracker.token(),
        }
    }

    /// Number of registered units that have not completed.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    pub fn state(&self) -> DrainState {
        if self.is_draining() {
            DrainState::Draining
        } else {
            DrainState::Accepting
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.is_cancelled()
    }

    /// Moves to [`DrainState::Draining`]. Returns `true` only for the call that
    /// performed the transition; later calls are no-ops.
    pub fn begin_drain(&self) -> bool {
        // Close first so `wait` can complete as soon as observers see the
        // draining state.
        let first = self.tracker.close();
        self.draining.cancel();

        #[cfg(feature = "tracing")]
        if first {
            tracing::info!(
                "Refusing new work, draining {} outstanding units",
                self.outstanding()
            );
        }

        first
    }

    /// Resolves once draining has begun and every unit has completed.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Begins draining and waits for outstanding units. Returns immediately if
    /// none are outstanding.
    pub async fn begin_drain_and_wait(&self) {
        self.begin_drain();
        self.wait().await;

        #[cfg(feature = "tracing")]
        tracing::info!("All outstanding units drained");
    }

    /// Resolves when draining begins.
    pub fn draining(&self) -> WaitForCancellationFuture<'_> {
        self.draining.cancelled()
    }

    /// A token cancelled when draining begins, for owners that need a
    /// `'static` future. Cancelling the returned token does not begin a drain.
    pub fn draining_token(&self) -> CancellationToken {
        self.draining.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn drain_with_nothing_outstanding_returns_immediately() {
        let drain = DrainController::new();
        assert_eq!(drain.state(), DrainState::Accepting);
        tokio::time::timeout(Duration::from_secs(1), drain.begin_drain_and_wait())
            .await
            .expect("drain should not block with zero outstanding units");
        assert_eq!(drain.state(), DrainState::Draining);
    }

    #[test]
    fn begin_drain_is_idempotent() {
        let drain = DrainController::new();
        assert!(drain.begin_drain());
        assert!(!drain.begin_drain());
        assert!(drain.is_draining());
    }

    #[test]
    fn guards_count_outstanding_units() {
        let drain = DrainController::new();
        let a = drain.register_start();
        let b = drain.register_start();
        assert_eq!(drain.outstanding(), 2);
        a.complete();
        assert_eq!(drain.outstanding(), 1);
        drop(b);
        assert_eq!(drain.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_until_last_unit_completes() {
        let drain = DrainController::new();
        let finished = Arc::new(AtomicUsize::new(0));

        for delay in [30, 10, 20] {
            let guard = drain.register_start();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                drop(guard);
            });
        }

        drain.begin_drain_and_wait().await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(drain.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn registration_after_drain_is_still_awaited() {
        let drain = DrainController::new();
        assert!(drain.begin_drain());

        // A dispatch that checked `is_draining` just before the drain began.
        let late = drain.register_start();
        assert_eq!(drain.outstanding(), 1);

        let waiter = tokio::spawn({
            let drain = drain.clone();
            async move { drain.wait().await }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!waiter.is_finished(), "drain completed with a unit running");

        late.complete();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drain should complete once the late unit finishes")
            .unwrap();
        assert_eq!(drain.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_does_not_resolve_before_draining() {
        let drain = DrainController::new();
        let waited = tokio::time::timeout(Duration::from_secs(1), drain.wait()).await;
        assert!(waited.is_err(), "wait resolved without a drain request");
    }

    #[tokio::test]
    async fn panicking_unit_still_deregisters() {
        let drain = DrainController::new();
        let guard = drain.register_start();
        let handle: tokio::task::JoinHandle<()> = tokio::spawn(async move {
            let _guard = guard;
            panic!("unit failed");
        });
        assert!(handle.await.is_err());
        assert_eq!(drain.outstanding(), 0);
        drain.begin_drain_and_wait().await;
    }

    #[tokio::test]
    async fn draining_future_and_token_fire_on_drain() {
        let drain = DrainController::new();
        let token = drain.draining_token();

        token.cancel();
        assert!(!drain.is_draining(), "child token must not start a drain");

        let token = drain.draining_token();
        drain.begin_drain();
        drain.draining().await;
        token.cancelled().await;
    }
}
