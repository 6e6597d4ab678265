//! Scope-partitioned dedup cache: atomic insert-if-absent per (scope, value) with idle eviction.
//!
//! Every scope owns an entry behind its own `RwLock`, so callers on different
//! scopes never wait on each other. The scope map sits behind a coarse `RwLock`:
//! finding an existing entry takes it shared, and only creating, resetting or
//! discarding entries takes it exclusively. Lock order is always map -> entry;
//! nothing waits for the map while holding an entry.
//!
//! Values are accepted as any `R: Borrow<V>` and compared through the borrowed
//! content, so `&v`, `Box<v>`, `Arc<v>` and `v` are one identity.

use crate::cleanup::CleanupRoutine;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

/// Values seen under one scope with the second they were inserted.
#[derive(Debug)]
struct Entry<V> {
    touched: HashMap<V, i64>,
    /// Set when `delete_key` replaces this entry or `flush_all` discards it.
    /// A caller that lands on a retired entry looks the scope up again.
    retired: bool,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            touched: HashMap::new(),
            retired: false,
        }
    }
}

impl<V: Eq + Hash + Clone> Entry<V> {
    fn remove(&mut self, value: &V) -> bool {
        self.touched.remove(value).is_some()
    }

    /// Drops every value idle for strictly more than `max_idle_secs`.
    fn evict_idle(&mut self, now: i64, max_idle_secs: i64) -> usize {
        let idle: Vec<V> = self
            .touched
            .iter()
            .filter(|(_, touched)| now.saturating_sub(**touched) > max_idle_secs)
            .map(|(value, _)| value.clone())
            .collect();
        idle.iter().filter(|value| self.remove(value)).count()
    }

    fn retire(&mut self) {
        self.retired = true;
        self.touched.clear();
    }
}

type SharedEntry<V> = Arc<RwLock<Entry<V>>>;

fn fresh_entry<V>() -> SharedEntry<V> {
    Arc::new(RwLock::new(Entry::default()))
}

/// Reduces any accepted representation of a value to the content it refers to.
/// All hashing and comparison goes through this.
fn canonical<V, R: Borrow<V>>(value: &R) -> &V {
    value.borrow()
}

/// In-process dedup store. Share it with `Arc`; the cleanup routine keeps only a weak handle.
pub struct DedupCache<V> {
    entries: RwLock<HashMap<String, SharedEntry<V>>>,
    clock: Arc<dyn Clock>,
    cleanup: StdMutex<Option<CleanupRoutine>>,
}

impl<V> DedupCache<V>
where
    V: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            cleanup: StdMutex::new(None),
        }
    }

    /// Inserts `value` under `scope` unless it is already there.
    ///
    /// Returns true for exactly one of any number of concurrent callers with the
    /// same (scope, value). A value that is already present keeps its original stamp.
    pub async fn try_set<R: Borrow<V>>(&self, scope: &str, value: R) -> bool {
        let value: &V = canonical(&value);
        let mut entry = self.write_entry_or_create(scope).await;
        if entry.touched.contains_key(value) {
            return false;
        }
        entry.touched.insert(value.clone(), self.clock.now_secs());
        true
    }

    /// Pure lookup: never refreshes the stamp.
    pub async fn exists<R: Borrow<V>>(&self, scope: &str, value: R) -> bool {
        match self.read_entry(scope).await {
            Some(entry) => entry.touched.contains_key(canonical::<V, R>(&value)),
            None => false,
        }
    }

    /// Removes one value. Returns whether it was present.
    pub async fn remove<R: Borrow<V>>(&self, scope: &str, value: R) -> bool {
        match self.write_entry(scope).await {
            Some(mut entry) => entry.remove(canonical::<V, R>(&value)),
            None => false,
        }
    }

    /// Forgets everything under `scope` by swapping in a fresh entry.
    pub async fn delete_key(&self, scope: &str) {
        let mut entries = self.entries.write().await;
        let previous = entries.insert(scope.to_owned(), fresh_entry());
        if let Some(previous) = previous {
            // Waits out any in-flight writer; it will retry against the fresh entry.
            previous.write().await.retire();
        }
        debug!(scope, "[Dedupe] scope reset");
    }

    /// Clears every scope.
    ///
    /// Entry locks are taken in ascending scope order and all held until every
    /// entry is retired, so no insert can land in an entry after it was discarded.
    pub async fn flush_all(&self) {
        let mut entries = self.entries.write().await;
        let ordered: BTreeMap<String, SharedEntry<V>> =
            std::mem::take(&mut *entries).into_iter().collect();

        let mut guards = Vec::with_capacity(ordered.len());
        for entry in ordered.values() {
            guards.push(Arc::clone(entry).write_owned().await);
        }
        for guard in guards.iter_mut() {
            guard.retire();
        }
        drop(guards);

        debug!(scopes = ordered.len(), "[Dedupe] flushed all scopes");
    }

    /// One eviction pass over all scopes. Returns how many values were dropped.
    ///
    /// Scopes reset or flushed while the pass runs are skipped.
    pub async fn sweep_idle(&self, max_idle_secs: u64) -> usize {
        let max_idle_secs = i64::try_from(max_idle_secs).unwrap_or(i64::MAX);
        let now = self.clock.now_secs();
        let snapshot: Vec<(String, SharedEntry<V>)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .map(|(scope, entry)| (scope.clone(), Arc::clone(entry)))
                .collect()
        };

        let mut evicted = 0;
        for (scope, entry) in snapshot {
            let mut entry = entry.write().await;
            if entry.retired {
                continue;
            }
            let dropped = entry.evict_idle(now, max_idle_secs);
            if dropped > 0 {
                debug!(scope = %scope, dropped, "[Dedupe] evicted idle values");
            }
            evicted += dropped;
        }
        evicted
    }

    /// Number of values currently held under `scope`.
    pub async fn len(&self, scope: &str) -> usize {
        self.read_entry(scope)
            .await
            .map_or(0, |entry| entry.touched.len())
    }

    /// Known scope keys, sorted.
    pub async fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.entries.read().await.keys().cloned().collect();
        scopes.sort();
        scopes
    }

    /// Starts the background eviction task on the current tokio runtime.
    ///
    /// Every `interval` the task drops values idle for more than `max_idle_secs`.
    pub fn start_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        max_idle_secs: u64,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::InvalidInterval);
        }
        let mut slot = self.cleanup.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|routine| !routine.is_finished()) {
            return Err(Error::CleanupAlreadyRunning);
        }
        *slot = Some(CleanupRoutine::spawn(
            Arc::downgrade(self),
            interval,
            max_idle_secs,
        ));
        Ok(())
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|routine| !routine.is_finished())
    }

    /// Stops the cleanup routine and waits for the tick in progress, if any. No-op when not running.
    pub async fn shutdown(&self) {
        let routine = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(routine) = routine {
            routine.stop_and_wait().await;
        }
    }

    async fn write_entry_or_create(&self, scope: &str) -> OwnedRwLockWriteGuard<Entry<V>> {
        loop {
            let existing = self.entries.read().await.get(scope).map(Arc::clone);
            let entry = match existing {
                Some(entry) => entry,
                None => Arc::clone(
                    self.entries
                        .write()
                        .await
                        .entry(scope.to_owned())
                        .or_insert_with(fresh_entry),
                ),
            };
            let guard = entry.write_owned().await;
            if !guard.retired {
                return guard;
            }
        }
    }

    async fn write_entry(&self, scope: &str) -> Option<OwnedRwLockWriteGuard<Entry<V>>> {
        loop {
            let entry = Arc::clone(self.entries.read().await.get(scope)?);
            let guard = entry.write_owned().await;
            if !guard.retired {
                return Some(guard);
            }
        }
    }

    async fn read_entry(&self, scope: &str) -> Option<OwnedRwLockReadGuard<Entry<V>>> {
        loop {
            let entry = Arc::clone(self.entries.read().await.get(scope)?);
            let guard = entry.read_owned().await;
            if !guard.retired {
                return Some(guard);
            }
        }
    }
}

impl<V> Default for DedupCache<V>
where
    V: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for DedupCache<V> {
    fn drop(&mut self) {
        let slot = self.cleanup.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(routine) = slot.take() {
            routine.stop();
        }
    }
}
