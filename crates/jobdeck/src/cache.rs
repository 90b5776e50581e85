//! Memoized entity views keyed by snapshot content.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::fetch::JobSnapshot;
use crate::status::EntityView;
use crate::topology::Topology;

#[derive(Default)]
struct CacheState {
    views: HashMap<(u64, String), Arc<EntityView>>,
    /// Snapshot hashes seen, oldest first.
    generations: VecDeque<u64>,
}

/// Bounded cache of [`EntityView`]s.
///
/// A view is only reused for the exact snapshot content it was computed
/// from. When full, views of the oldest snapshot are dropped first.
pub struct ViewCache {
    capacity: usize,
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ViewCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: RwLock::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        match self.state.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("View cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        match self.state.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("View cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn get(&self, entity_key: &str, snapshot_hash: u64) -> Option<Arc<EntityView>> {
        let found = self
            .read()
            .views
            .get(&(snapshot_hash, entity_key.to_string()))
            .cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, snapshot_hash: u64, view: EntityView) -> Arc<EntityView> {
        let view = Arc::new(view);
        let mut state = self.write();

        if !state.generations.contains(&snapshot_hash) {
            state.generations.push_back(snapshot_hash);
        }
        while state.views.len() >= self.capacity {
            if !evict_one(&mut state, snapshot_hash) {
                break;
            }
        }

        state
            .views
            .insert((snapshot_hash, view.entity_key.clone()), view.clone());
        view
    }

    /// Returns the cached view of `entity_key` for `snapshot`, computing and
    /// storing it on a miss.
    pub fn get_or_compute(
        &self,
        snapshot: &JobSnapshot,
        entity_key: &str,
        topology: &Topology,
    ) -> Arc<EntityView> {
        let hash = snapshot.content_hash();
        if let Some(view) = self.get(entity_key, hash) {
            return view;
        }
        self.insert(hash, snapshot.entity_view(entity_key, topology))
    }

    pub fn len(&self) -> usize {
        self.read().views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.write();
        state.views.clear();
        state.generations.clear();
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Drops one view, preferring the oldest snapshot other than `current`.
/// Returns false if nothing could be evicted.
fn evict_one(state: &mut CacheState, current: u64) -> bool {
    while let Some(&oldest) = state.generations.front() {
        if oldest == current {
            break;
        }
        let victim = state
            .views
            .keys()
            .filter(|(hash, _)| *hash == oldest)
            .min()
            .cloned();
        match victim {
            Some(key) => {
                state.views.remove(&key);
                return true;
            }
            None => {
                state.generations.pop_front();
            }
        }
    }

    // Only the current snapshot is left
    let victim = state.views.keys().min().cloned();
    match victim {
        Some(key) => {
            state.views.remove(&key);
            true
        }
        None => false,
    }
}
