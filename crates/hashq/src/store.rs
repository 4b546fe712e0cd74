use crate::HashId;
use crossbeam_utils::CachePadded;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Default number of shards in a [`ResultStore`].
pub const DEFAULT_SHARDS: usize = 16;

type Shard = CachePadded<RwLock<HashMap<HashId, String>>>;

/// Concurrent map from [`HashId`] to the computed output.
///
/// The map is split into a power-of-two number of shards, each behind its own
/// read-write lock. Identifiers are issued sequentially, so taking the low
/// bits of the id spreads consecutive writes across every shard. Writers of
/// distinct shards never contend, and a reader only waits on a writer that
/// holds the same shard.
///
/// Absence is the only "pending" state: there is no in-progress marker.
#[derive(Debug)]
pub struct ResultStore {
    shards: Box<[Shard]>,
    mask: u64,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with `shards` shards, rounded up to a power of two
    /// (minimum 1).
    pub fn with_shards(shards: usize) -> Self {
        let shards = shards.max(1).next_power_of_two();
        Self {
            shards: (0..shards)
                .map(|_| CachePadded::new(RwLock::new(HashMap::new())))
                .collect(),
            mask: shards as u64 - 1,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, id: HashId) -> &Shard {
        &self.shards[(id.get() & self.mask) as usize]
    }

    /// Stores `value` under `id`. Each id is written once by the coordinator;
    /// a repeated write replaces the previous value.
    pub fn put(&self, id: HashId, value: String) {
        self.shard(id).write().insert(id, value);
    }

    /// Returns the stored output, or `None` if nothing is stored under `id`.
    ///
    /// An empty string is a valid stored value and is returned as
    /// `Some(String::new())`.
    pub fn get(&self, id: HashId) -> Option<String> {
        self.shard(id).read().get(&id).cloned()
    }

    pub fn contains(&self, id: HashId) -> bool {
        self.shard(id).read().contains_key(&id)
    }

    /// Total number of stored results. Shards are read one after another, so
    /// under concurrent writes the value is a lower bound of the final count.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::scope;

    fn id(raw: u64) -> HashId {
        HashId::new(raw).unwrap()
    }

    #[test]
    fn absent_until_put() {
        let store = ResultStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(id(1)), None);
        assert!(!store.contains(id(1)));

        store.put(id(1), "digest".to_string());
        assert_eq!(store.get(id(1)).as_deref(), Some("digest"));
        assert!(store.contains(id(1)));
        assert_eq!(store.get(id(2)), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_value_is_present() {
        let store = ResultStore::new();
        store.put(id(9), String::new());
        assert_eq!(store.get(id(9)), Some(String::new()));
    }

    #[test]
    fn second_write_wins() {
        let store = ResultStore::new();
        store.put(id(4), "first".to_string());
        store.put(id(4), "second".to_string());
        assert_eq!(store.get(id(4)).as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn shard_count_rounds_to_power_of_two() {
        assert_eq!(ResultStore::with_shards(0).shard_count(), 1);
        assert_eq!(ResultStore::with_shards(1).shard_count(), 1);
        assert_eq!(ResultStore::with_shards(5).shard_count(), 8);
        assert_eq!(ResultStore::new().shard_count(), DEFAULT_SHARDS);
    }

    #[test]
    fn parallel_writers_and_readers() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 2_000;

        let store = ResultStore::with_shards(4);
        scope(|s| {
            for t in 0..THREADS {
                let store = &store;
                s.spawn(move || {
                    for i in 0..PER_THREAD {
                        let raw = t * PER_THREAD + i + 1;
                        store.put(id(raw), raw.to_string());
                        assert_eq!(store.get(id(raw)), Some(raw.to_string()));
                    }
                });
            }
        });

        assert_eq!(store.len(), (THREADS * PER_THREAD) as usize);
        for raw in 1..=THREADS * PER_THREAD {
            assert_eq!(store.get(id(raw)), Some(raw.to_string()));
        }
    }
}
