//! Replay protection.
//!
//! Every accepted proof consumes its challenge nonce. The store tracks
//! consumed `"<addr>:<nonce>"` keys until the challenge they came from has
//! expired; a second proof inside that window is a replay.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Default maximum entry count for the in-memory store.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Sweep expired entries once per this many inserts.
const SWEEP_INTERVAL: u64 = 1_000;

/// Keyed expiry set tracking used `(addr, nonce)` pairs.
///
/// # Thread Safety
///
/// Uses `&self` for concurrent access; implementations use interior
/// mutability.
///
/// # Atomicity
///
/// [`check_and_store`](ReplayStore::check_and_store) **must be atomic**: two
/// concurrent verifications presenting the same key must not both observe it
/// absent. The default implementation is check-then-store and is only a
/// fallback; real implementations override it with a compare-and-insert
/// primitive or a per-key lock.
///
/// # Retention
///
/// Entries need to live only as long as the challenge that produced them;
/// the verifier passes the remaining challenge lifetime as the TTL.
/// Implementations must avoid unbounded growth.
///
/// # Failure
///
/// An implementation backed by an external service that cannot be reached
/// must fail closed: report the key as present from `check` and as not
/// inserted from `check_and_store`, so an outage rejects proofs instead of
/// silently admitting replays.
pub trait ReplayStore: Send + Sync {
    /// True iff the key is currently present and unexpired.
    ///
    /// `ttl` is the full challenge lifetime; implementations that record
    /// insertion times (rather than expiry deadlines) age entries against it.
    fn check(&self, key: &str, ttl: Duration) -> bool;

    /// Insert the key with expiry `now + ttl`.
    fn store(&self, key: &str, ttl: Duration);

    /// Check and insert as a single operation.
    ///
    /// Returns `true` if the key was newly inserted, `false` if it was
    /// already present and unexpired.
    fn check_and_store(&self, key: &str, ttl: Duration) -> bool {
        if self.check(key, ttl) {
            false
        } else {
            self.store(key, ttl);
            true
        }
    }
}

/// One consumed nonce: when it arrived and when it lapses.
#[derive(Debug, Clone, Copy)]
struct Record {
    inserted: Instant,
    expires: Instant,
}

/// Bounded in-memory LRU replay store.
///
/// Suitable for single-node deployments; a production deployment behind a
/// load balancer substitutes a shared store.
///
/// # Properties
///
/// - Memory-bounded via a maximum entry count, evicting the **oldest**
///   entry on overflow. A consumed nonce is never touched again, so
///   insertion order is recency order and oldest-first is exact LRU.
/// - Lock-free concurrent lookups via `DashMap`; check-and-store atomicity
///   through the entry API; eviction order tracked in a secondary
///   insertion-order queue.
/// - Opportunistic sweep of expired entries every [`SWEEP_INTERVAL`] inserts;
///   not required for correctness, expired entries are ignored on lookup.
pub struct LruReplayStore {
    /// Map of key -> record.
    entries: DashMap<String, Record>,
    /// Keys in insertion order, stamped so records superseded by expiry
    /// reuse can be recognized as stale and skipped.
    order: Mutex<VecDeque<(String, Instant)>>,
    /// Maximum entries before eviction.
    max_entries: usize,
    /// Counter driving the periodic sweep.
    insert_counter: AtomicU64,
}

impl LruReplayStore {
    /// Create a store bounded at [`DEFAULT_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store bounded at `max_entries`.
    #[must_use]
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(max_entries / 4),
            order: Mutex::new(VecDeque::new()),
            max_entries,
            insert_counter: AtomicU64::new(0),
        }
    }

    /// Remove expired entries and the order records that pointed at them.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, record| record.expires > now);
        self.order
            .lock()
            .expect("eviction order lock poisoned")
            .retain(|(key, inserted)| {
                self.entries
                    .get(key)
                    .is_some_and(|record| record.inserted == *inserted)
            });
    }

    /// Current number of entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_order(&self, key: &str, inserted: Instant) {
        self.order
            .lock()
            .expect("eviction order lock poisoned")
            .push_back((key.to_string(), inserted));
    }

    fn after_insert(&self) {
        let count = self.insert_counter.fetch_add(1, Ordering::Relaxed);
        if count % SWEEP_INTERVAL == 0 {
            self.sweep_expired();
        }

        // Evict oldest entries until back under capacity. A front record
        // whose stamp no longer matches was superseded (expiry reuse) or
        // already swept; skip it and keep popping.
        while self.entries.len() > self.max_entries {
            let front = {
                self.order
                    .lock()
                    .expect("eviction order lock poisoned")
                    .pop_front()
            };
            let Some((key, inserted)) = front else { break };
            self.entries
                .remove_if(&key, |_, record| record.inserted == inserted);
        }
    }
}

impl Default for LruReplayStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayStore for LruReplayStore {
    fn check(&self, key: &str, _ttl: Duration) -> bool {
        self.entries
            .get(key)
            .is_some_and(|record| record.expires > Instant::now())
    }

    fn store(&self, key: &str, ttl: Duration) {
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            Record {
                inserted: now,
                expires: now + ttl,
            },
        );
        self.push_order(key, now);
        self.after_insert();
    }

    fn check_and_store(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let record = Record {
            inserted: now,
            expires: now + ttl,
        };

        // Entry API gives an atomic check-and-insert per key.
        let inserted = match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                if entry.get().expires > now {
                    false
                } else {
                    // Expired entry: the nonce may be consumed again.
                    entry.replace_entry(record);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
        };

        // Order bookkeeping, sweep, and eviction happen after the entry
        // lock is released.
        if inserted {
            self.push_order(key, now);
            self.after_insert();
        }
        inserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_first_insert_succeeds() {
        let store = LruReplayStore::new();
        assert!(store.check_and_store("addr:n1", TTL));
    }

    #[test]
    fn test_replay_detected() {
        let store = LruReplayStore::new();
        assert!(store.check_and_store("addr:n1", TTL));
        assert!(!store.check_and_store("addr:n1", TTL));
    }

    #[test]
    fn test_check_does_not_consume() {
        let store = LruReplayStore::new();
        assert!(!store.check("addr:n1", TTL));
        assert!(!store.check("addr:n1", TTL));
        store.store("addr:n1", TTL);
        assert!(store.check("addr:n1", TTL));
    }

    #[test]
    fn test_distinct_keys_do_not_collide() {
        let store = LruReplayStore::new();
        assert!(store.check_and_store("alice:n1", TTL));
        assert!(store.check_and_store("bob:n1", TTL));
        assert!(store.check_and_store("alice:n2", TTL));
    }

    #[test]
    fn test_expired_entry_allows_reuse() {
        let store = LruReplayStore::new();
        assert!(store.check_and_store("addr:n1", Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(20));
        assert!(!store.check("addr:n1", TTL));
        assert!(store.check_and_store("addr:n1", TTL));
    }

    #[test]
    fn test_sweep_removes_expired() {
        let store = LruReplayStore::new();
        store.store("addr:n1", Duration::from_millis(10));
        assert_eq!(store.len(), 1);
        thread::sleep(Duration::from_millis(20));
        store.sweep_expired();
        assert!(store.is_empty());
    }

    #[test]
    fn test_eviction_at_capacity() {
        let max_entries = 10;
        let store = LruReplayStore::with_capacity(max_entries);
        for i in 0..(max_entries + 5) {
            store.check_and_store(&format!("addr:n{i}"), TTL);
        }
        assert!(store.len() <= max_entries);
    }

    #[test]
    fn test_eviction_removes_oldest_first() {
        let store = LruReplayStore::with_capacity(3);
        store.check_and_store("addr:n0", TTL);
        store.check_and_store("addr:n1", TTL);
        store.check_and_store("addr:n2", TTL);

        // One over capacity: n0 is the oldest and must be the victim.
        store.check_and_store("addr:n3", TTL);
        assert!(!store.check("addr:n0", TTL));
        assert!(store.check("addr:n1", TTL));
        assert!(store.check("addr:n2", TTL));
        assert!(store.check("addr:n3", TTL));

        // Again: now n1 is the oldest.
        store.check_and_store("addr:n4", TTL);
        assert!(!store.check("addr:n1", TTL));
        assert!(store.check("addr:n2", TTL));
        assert!(store.check("addr:n3", TTL));
        assert!(store.check("addr:n4", TTL));
    }

    #[test]
    fn test_expiry_reuse_refreshes_eviction_order() {
        let store = LruReplayStore::with_capacity(2);
        store.check_and_store("addr:n0", Duration::from_millis(10));
        thread::sleep(Duration::from_millis(20));

        // Re-consume n0 after expiry; its stale order record must not get
        // the fresh record evicted ahead of genuinely older keys.
        assert!(store.check_and_store("addr:n0", TTL));
        store.check_and_store("addr:n1", TTL);
        store.check_and_store("addr:n2", TTL);

        assert!(store.len() <= 2);
        assert!(!store.check("addr:n0", TTL), "oldest live entry is evicted");
        assert!(store.check("addr:n1", TTL));
        assert!(store.check("addr:n2", TTL));
    }

    #[test]
    fn test_sweep_prunes_order_records() {
        let store = LruReplayStore::with_capacity(2);
        store.store("addr:n0", Duration::from_millis(10));
        store.store("addr:n1", Duration::from_millis(10));
        thread::sleep(Duration::from_millis(20));
        store.sweep_expired();
        assert!(store.is_empty());

        // Fresh inserts after the sweep must not be evicted by leftover
        // records for the swept keys.
        store.store("addr:n2", TTL);
        store.store("addr:n3", TTL);
        assert!(store.check("addr:n2", TTL));
        assert!(store.check("addr:n3", TTL));
    }

    #[test]
    fn test_concurrent_same_key_single_winner() {
        let store = Arc::new(LruReplayStore::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || store.check_and_store("addr:n1", TTL)));
        }

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|&&won| won).count();
        assert_eq!(winners, 1, "exactly one concurrent insert should win");
    }
}
