use crate::{Error, HashId};
use core::time::Duration;

/// Hooks invoked along a unit's lifecycle.
///
/// Used to feed metrics backends without coupling the coordinator to one.
/// Every method defaults to a no-op, and all of them run on the dispatching
/// caller or on the unit's task, so implementations must not block.
pub trait Observer: Send + Sync + 'static {
    /// A unit was registered and its task spawned.
    fn on_dispatch(&self, _id: HashId) {}

    /// A unit stored its output. `elapsed` runs from dispatch to completion.
    fn on_complete(&self, _id: HashId, _elapsed: Duration) {}

    /// A unit's transform failed; its id stays absent from the store.
    fn on_failure(&self, _id: HashId, _error: &Error) {}

    /// A unit ended without reaching [`Observer::on_complete`] or
    /// [`Observer::on_failure`], because its task panicked or was dropped.
    fn on_abandon(&self, _id: HashId) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}
