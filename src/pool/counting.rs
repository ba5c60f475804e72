use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::pool::reference::{PooledRef, Releaser};

/// Values stored in a [`CountingPool`] report their retained size.
pub trait PoolValue {
    /// Bytes retained by this value.
    fn size_in_bytes(&self) -> usize;
}

/// Receives exclusivity transitions for pool entries.
///
/// An entry is *exclusive* when the pool holds the only reference to it. Callbacks run after the
/// pool lock is released, possibly on whichever thread dropped the last client ref.
pub trait ExclusivityObserver<K>: Send + Sync {
    /// `is_exclusive` is `true` when the last client ref went away and `false` when the entry was
    /// re-acquired, reused, replaced or evicted.
    fn on_exclusivity_changed(&self, key: &K, is_exclusive: bool);
}

/// Shared observer handle registered with an entry.
pub type ObserverRef<K> = Arc<dyn ExclusivityObserver<K>>;

/// Capacity limits for a [`CountingPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOpts {
    /// Maximum number of entries (in use and exclusive).
    pub max_entries: usize,
    /// Maximum retained bytes (in use and exclusive).
    pub max_bytes: usize,
    /// Maximum number of exclusive entries kept for reuse.
    pub max_exclusive_entries: usize,
    /// Maximum bytes held by exclusive entries.
    pub max_exclusive_bytes: usize,
    /// Largest single value the pool accepts.
    pub max_entry_bytes: usize,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            max_entries: 256,
            max_bytes: 256 * 1024 * 1024,
            max_exclusive_entries: 64,
            max_exclusive_bytes: 64 * 1024 * 1024,
            max_entry_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Cumulative pool counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// `get` calls that found an entry.
    pub hits: u64,
    /// `get` calls that found nothing.
    pub misses: u64,
    /// Accepted `cache` calls.
    pub inserts: u64,
    /// `cache` calls refused for capacity.
    pub rejected: u64,
    /// Entries handed back through `reuse`.
    pub reused: u64,
    /// Exclusive entries evicted to honor limits.
    pub evicted: u64,
}

struct Entry<K, V> {
    id: u64,
    value: Arc<V>,
    bytes: usize,
    clients: u32,
    observer: Option<ObserverRef<K>>,
}

struct Notice<K> {
    observer: ObserverRef<K>,
    key: K,
    exclusive: bool,
}

type Notices<K> = SmallVec<[Notice<K>; 4]>;

fn deliver<K>(notices: Notices<K>) {
    for notice in notices {
        notice
            .observer
            .on_exclusivity_changed(&notice.key, notice.exclusive);
    }
}

struct PoolState<K, V> {
    entries: HashMap<K, Entry<K, V>>,
    keys_by_id: HashMap<u64, K>,
    // Exclusive keys, least recently released first.
    exclusive: VecDeque<K>,
    bytes: usize,
    exclusive_bytes: usize,
    next_id: u64,
    stats: PoolStats,
}

impl<K: Eq + Hash + Clone, V> PoolState<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            keys_by_id: HashMap::new(),
            exclusive: VecDeque::new(),
            bytes: 0,
            exclusive_bytes: 0,
            next_id: 1,
            stats: PoolStats::default(),
        }
    }

    fn in_use_count(&self) -> usize {
        self.entries.len() - self.exclusive.len()
    }

    fn in_use_bytes(&self) -> usize {
        self.bytes - self.exclusive_bytes
    }

    fn drop_exclusive_key(&mut self, key: &K) {
        if let Some(pos) = self.exclusive.iter().position(|k| k == key) {
            self.exclusive.remove(pos);
        }
    }

    fn remove_entry(&mut self, key: &K, notices: &mut Notices<K>) -> Option<Entry<K, V>> {
        let entry = self.entries.remove(key)?;
        self.keys_by_id.remove(&entry.id);
        self.bytes -= entry.bytes;
        if entry.clients == 0 {
            self.drop_exclusive_key(key);
            self.exclusive_bytes -= entry.bytes;
            if let Some(observer) = &entry.observer {
                notices.push(Notice {
                    observer: Arc::clone(observer),
                    key: key.clone(),
                    exclusive: false,
                });
            }
        }
        Some(entry)
    }

    fn acquire(&mut self, key: &K, notices: &mut Notices<K>) -> Option<(Arc<V>, u64)> {
        let (value, id, bytes, observer, was_exclusive) = {
            let entry = self.entries.get_mut(key)?;
            let was_exclusive = entry.clients == 0;
            entry.clients += 1;
            (
                Arc::clone(&entry.value),
                entry.id,
                entry.bytes,
                entry.observer.clone(),
                was_exclusive,
            )
        };
        if was_exclusive {
            self.drop_exclusive_key(key);
            self.exclusive_bytes -= bytes;
            if let Some(observer) = observer {
                notices.push(Notice {
                    observer,
                    key: key.clone(),
                    exclusive: false,
                });
            }
        }
        Some((value, id))
    }

    fn retain_client(&mut self, id: u64) {
        let Some(key) = self.keys_by_id.get(&id) else {
            return;
        };
        if let Some(entry) = self.entries.get_mut(key) {
            entry.clients += 1;
        }
    }

    fn release_client(&mut self, id: u64, notices: &mut Notices<K>) {
        // Orphans are no longer indexed; their release does not touch the pool.
        let Some(key) = self.keys_by_id.get(&id).cloned() else {
            return;
        };
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        entry.clients = entry.clients.saturating_sub(1);
        if entry.clients > 0 {
            return;
        }
        let bytes = entry.bytes;
        let observer = entry.observer.clone();
        self.exclusive.push_back(key.clone());
        self.exclusive_bytes += bytes;
        if let Some(observer) = observer {
            notices.push(Notice {
                observer,
                key,
                exclusive: true,
            });
        }
    }

    fn trim_exclusive(&mut self, max_entries: usize, max_bytes: usize, notices: &mut Notices<K>) {
        while self.exclusive.len() > max_entries || self.exclusive_bytes > max_bytes {
            let Some(key) = self.exclusive.front().cloned() else {
                break;
            };
            if self.remove_entry(&key, notices).is_some() {
                self.stats.evicted += 1;
            } else {
                self.exclusive.pop_front();
            }
        }
    }

    fn evict_to_limits(&mut self, opts: &PoolOpts, notices: &mut Notices<K>) {
        let max_entries = opts
            .max_exclusive_entries
            .min(opts.max_entries.saturating_sub(self.in_use_count()));
        let max_bytes = opts
            .max_exclusive_bytes
            .min(opts.max_bytes.saturating_sub(self.in_use_bytes()));
        self.trim_exclusive(max_entries, max_bytes, notices);
    }

    fn can_cache(&self, opts: &PoolOpts, bytes: usize) -> bool {
        bytes <= opts.max_entry_bytes
            && self.in_use_count() < opts.max_entries
            && self.in_use_bytes().saturating_add(bytes) <= opts.max_bytes
    }
}

struct PoolShared<K, V> {
    opts: PoolOpts,
    state: Mutex<PoolState<K, V>>,
}

impl<K, V> Releaser for PoolShared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn retain(&self, entry_id: u64) {
        self.state.lock().retain_client(entry_id);
    }

    fn release(&self, entry_id: u64) {
        let notices = {
            let mut state = self.state.lock();
            let mut notices = Notices::new();
            state.release_client(entry_id, &mut notices);
            state.evict_to_limits(&self.opts, &mut notices);
            notices
        };
        deliver(notices);
    }
}

/// Reference-counted shared cache keyed by `K`.
///
/// Every value handed out is a leased [`PooledRef`]. Entries whose client count drops to zero
/// become exclusive: the pool keeps them for later `get`/`reuse` calls until limits force an
/// eviction, oldest released first. Replacing or clearing an entry orphans it: outstanding refs
/// stay valid and their release no longer affects the pool.
pub struct CountingPool<K, V> {
    shared: Arc<PoolShared<K, V>>,
}

impl<K, V> Clone for CountingPool<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> CountingPool<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: PoolValue + Clone + Send + Sync + 'static,
{
    /// Create an empty pool.
    pub fn new(opts: PoolOpts) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                opts,
                state: Mutex::new(PoolState::new()),
            }),
        }
    }

    /// Limits this pool was created with.
    pub fn opts(&self) -> PoolOpts {
        self.shared.opts
    }

    fn releaser(&self) -> Arc<dyn Releaser> {
        Arc::clone(&self.shared) as Arc<dyn Releaser>
    }

    /// Insert `value` under `key`, replacing any previous entry.
    ///
    /// Returns a ref counted as the entry's first client, or `None` when the value does not fit
    /// within the limits.
    pub fn cache(
        &self,
        key: K,
        value: Arc<V>,
        observer: Option<ObserverRef<K>>,
    ) -> Option<PooledRef<V>> {
        let bytes = value.size_in_bytes();
        let (out, notices) = {
            let mut state = self.shared.state.lock();
            let mut notices = Notices::new();
            state.remove_entry(&key, &mut notices);
            let out = if state.can_cache(&self.shared.opts, bytes) {
                let id = state.next_id;
                state.next_id += 1;
                state.entries.insert(
                    key.clone(),
                    Entry {
                        id,
                        value: Arc::clone(&value),
                        bytes,
                        clients: 1,
                        observer,
                    },
                );
                state.keys_by_id.insert(id, key);
                state.bytes += bytes;
                state.stats.inserts += 1;
                Some((value, id))
            } else {
                state.stats.rejected += 1;
                None
            };
            state.evict_to_limits(&self.shared.opts, &mut notices);
            (out, notices)
        };
        deliver(notices);
        out.map(|(value, id)| PooledRef::leased(value, self.releaser(), id))
    }

    /// Acquire a new client ref for `key`.
    pub fn get(&self, key: &K) -> Option<PooledRef<V>> {
        let (out, notices) = {
            let mut state = self.shared.state.lock();
            let mut notices = Notices::new();
            let out = state.acquire(key, &mut notices);
            if out.is_some() {
                state.stats.hits += 1;
            } else {
                state.stats.misses += 1;
            }
            (out, notices)
        };
        deliver(notices);
        out.map(|(value, id)| PooledRef::leased(value, self.releaser(), id))
    }

    /// Take an exclusive entry out of the pool for overwriting.
    ///
    /// Fails for missing entries and entries that still have clients. A ref that is mid-release
    /// on another thread may still share the value; the value is copied in that case so the
    /// returned buffer never aliases a live handle.
    pub fn reuse(&self, key: &K) -> Option<V> {
        let (value, notices) = {
            let mut state = self.shared.state.lock();
            if !state.entries.get(key).is_some_and(|e| e.clients == 0) {
                return None;
            }
            let mut notices = Notices::new();
            let entry = state.remove_entry(key, &mut notices)?;
            state.stats.reused += 1;
            (entry.value, notices)
        };
        deliver(notices);
        Some(Arc::try_unwrap(value).unwrap_or_else(|shared| V::clone(&shared)))
    }

    /// Return `true` when an entry exists for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.shared.state.lock().entries.contains_key(key)
    }

    /// Return `true` when `key` exists and has no clients.
    pub fn is_exclusive(&self, key: &K) -> bool {
        self.shared
            .state
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| e.clients == 0)
    }

    /// Drop every entry. Outstanding refs stay valid as orphans.
    pub fn clear(&self) {
        let notices = {
            let mut state = self.shared.state.lock();
            let mut notices = Notices::new();
            let keys = state.entries.keys().cloned().collect::<Vec<_>>();
            for key in keys {
                state.remove_entry(&key, &mut notices);
            }
            notices
        };
        deliver(notices);
    }

    /// Evict exclusive entries, oldest released first, until at most `max_entries` entries and
    /// `max_bytes` bytes remain exclusive.
    pub fn trim_exclusive(&self, max_entries: usize, max_bytes: usize) {
        let notices = {
            let mut state = self.shared.state.lock();
            let mut notices = Notices::new();
            state.trim_exclusive(max_entries, max_bytes, &mut notices);
            notices
        };
        deliver(notices);
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Bytes retained by all entries.
    pub fn size_in_bytes(&self) -> usize {
        self.shared.state.lock().bytes
    }

    /// Number of entries with at least one client.
    pub fn in_use_count(&self) -> usize {
        self.shared.state.lock().in_use_count()
    }

    /// Number of exclusive entries.
    pub fn exclusive_count(&self) -> usize {
        self.shared.state.lock().exclusive.len()
    }

    /// Bytes retained by exclusive entries.
    pub fn exclusive_bytes(&self) -> usize {
        self.shared.state.lock().exclusive_bytes
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PoolStats {
        self.shared.state.lock().stats
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pool/counting.rs"]
mod tests;
