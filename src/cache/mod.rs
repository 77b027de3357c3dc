// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory cache of node output slots.
//!
//! Entries are keyed by `(node id, slot name)` and hold a sealed
//! `Arc<DataSlot>`. The index is guarded by a short-lived mutex; payload
//! lifetime is handled by reference counting, so a [`CacheHandle`] keeps its
//! slot alive even after the entry was invalidated.
//!
//! Every node also has a generation that [`MemoryCache::invalidate`] bumps.
//! A run records the generations of its nodes when it is created and stores
//! through [`MemoryCache::store_if_current`], so results computed from a graph
//! that was edited in the meantime never enter the cache.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::config::consts::DEFAULT_EVENT_CAPACITY;
use crate::data::DataSlot;
use crate::engine::ProgressInfo;
use crate::graph::NodeId;
use crate::observability::messages::cache::{
    CacheEntryReleased, CacheInvalidated, SlotStored, StaleSlotDiscarded,
};
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    Stored { node: NodeId, slot: String, rows: usize },
    Invalidated { node: NodeId, removed: usize },
    /// The last handle on an entry was dropped
    Released { node: NodeId, slot: String },
    Cleared,
}

#[derive(Debug)]
struct CacheEntry {
    slot: Arc<DataSlot>,
    parent: Option<NodeId>,
    users: Arc<AtomicUsize>,
}

type EntryKey = (NodeId, String);

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<EntryKey, CacheEntry>,
    /// Bumped on every invalidation of a node. Absent means zero.
    generations: HashMap<NodeId, u64>,
}

impl CacheState {
    fn generation(&self, node: NodeId) -> u64 {
        self.generations.get(&node).copied().unwrap_or(0)
    }

    /// Removes every entry of `node` and every entry whose parent is `node`.
    fn remove(&mut self, node: NodeId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(id, _), entry| *id != node && entry.parent != Some(node));
        before - self.entries.len()
    }
}

#[derive(Debug)]
pub struct MemoryCache {
    state: Mutex<CacheState>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(CacheState::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `slot` as the output `slot.name()` of `node`, replacing any
    /// previous entry.
    ///
    /// `parent` names the node this entry was derived from; invalidating the
    /// parent removes the entry too. Unsealed slots are stored as a sealed copy.
    pub fn store(
        &self,
        node: NodeId,
        parent: Option<NodeId>,
        slot: Arc<DataSlot>,
        progress: &ProgressInfo,
    ) {
        let slot = sealed(slot);
        let entry = new_entry(slot.clone(), parent);
        self.lock()
            .entries
            .insert((node, slot.name().to_string()), entry);
        self.stored(node, &slot, progress);
    }

    /// Like [`store`](Self::store), but only while the generation of the
    /// entry's owner (`parent`, or `node` itself) still equals `generation`.
    ///
    /// Returns `false` and leaves the cache untouched when the owner was
    /// invalidated after `generation` was read.
    pub fn store_if_current(
        &self,
        node: NodeId,
        parent: Option<NodeId>,
        slot: Arc<DataSlot>,
        generation: u64,
        progress: &ProgressInfo,
    ) -> bool {
        let owner = parent.unwrap_or(node);
        let slot = sealed(slot);
        {
            let mut state = self.lock();
            let current = state.generation(owner);
            if current != generation {
                drop(state);
                StaleSlotDiscarded {
                    node_id: &node,
                    slot: slot.name(),
                    recorded: generation,
                    current,
                }
                .log();
                return false;
            }
            let entry = new_entry(slot.clone(), parent);
            state.entries.insert((node, slot.name().to_string()), entry);
        }
        self.stored(node, &slot, progress);
        true
    }

    /// Current generation of `node`. Starts at zero.
    pub fn generation(&self, node: NodeId) -> u64 {
        self.lock().generation(node)
    }

    /// Generations of `nodes`, read under one lock.
    pub fn generations<I>(&self, nodes: I) -> HashMap<NodeId, u64>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let state = self.lock();
        nodes
            .into_iter()
            .map(|node| (node, state.generation(node)))
            .collect()
    }

    fn stored(&self, node: NodeId, slot: &DataSlot, progress: &ProgressInfo) {
        let name = slot.name().to_string();
        let rows = slot.row_count();
        progress.log(format!("Caching {} row(s) of '{}'", rows, name));
        SlotStored {
            node_id: &node,
            slot: &name,
            rows,
        }
        .log();
        let _ = self.events.send(CacheEvent::Stored {
            node,
            slot: name,
            rows,
        });
    }

    pub fn query(&self, node: NodeId, slot: &str) -> Option<Arc<DataSlot>> {
        self.lock()
            .entries
            .get(&(node, slot.to_string()))
            .map(|entry| entry.slot.clone())
    }

    pub fn contains(&self, node: NodeId, slot: &str) -> bool {
        self.lock().entries.contains_key(&(node, slot.to_string()))
    }

    /// Every cached output of `node`.
    pub fn outputs_of(&self, node: NodeId) -> Vec<Arc<DataSlot>> {
        let mut slots: Vec<Arc<DataSlot>> = self
            .lock()
            .entries
            .iter()
            .filter(|((id, _), _)| *id == node)
            .map(|(_, entry)| entry.slot.clone())
            .collect();
        slots.sort_by(|a, b| a.name().cmp(b.name()));
        slots
    }

    /// Scoped access to an entry. The entry's user count is raised until the
    /// handle is dropped.
    pub fn acquire(&self, node: NodeId, slot: &str) -> Option<CacheHandle> {
        let state = self.lock();
        let entry = state.entries.get(&(node, slot.to_string()))?;
        entry.users.fetch_add(1, Ordering::SeqCst);
        Some(CacheHandle {
            node,
            slot: entry.slot.clone(),
            users: entry.users.clone(),
            events: self.events.clone(),
        })
    }

    /// Number of live handles on an entry. Zero for unknown entries.
    pub fn user_count(&self, node: NodeId, slot: &str) -> usize {
        self.lock()
            .entries
            .get(&(node, slot.to_string()))
            .map(|entry| entry.users.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Removes every entry of `node` and every entry whose parent is `node`,
    /// and bumps the generation of `node`. Returns the number of removed
    /// entries.
    ///
    /// Call this whenever the node, its parameters, or anything upstream of
    /// it changed.
    pub fn invalidate(&self, node: NodeId) -> usize {
        let removed = {
            let mut state = self.lock();
            *state.generations.entry(node).or_insert(0) += 1;
            state.remove(node)
        };
        self.invalidated(node, removed);
        removed
    }

    /// Removes the entries [`invalidate`](Self::invalidate) would, without
    /// bumping the generation. For dropping results that are about to be
    /// recomputed from an unchanged graph.
    pub fn evict(&self, node: NodeId) -> usize {
        let removed = self.lock().remove(node);
        self.invalidated(node, removed);
        removed
    }

    fn invalidated(&self, node: NodeId, removed: usize) {
        if removed > 0 {
            CacheInvalidated {
                node_id: &node,
                removed,
            }
            .log();
        }
        let _ = self.events.send(CacheEvent::Invalidated { node, removed });
    }

    /// Drops every entry. Generations are kept.
    pub fn clear(&self) {
        self.lock().entries.clear();
        let _ = self.events.send(CacheEvent::Cleared);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}

fn sealed(slot: Arc<DataSlot>) -> Arc<DataSlot> {
    if slot.is_sealed() {
        slot
    } else {
        Arc::new(slot.sealed_copy())
    }
}

fn new_entry(slot: Arc<DataSlot>, parent: Option<NodeId>) -> CacheEntry {
    CacheEntry {
        slot,
        parent,
        users: Arc::new(AtomicUsize::new(0)),
    }
}

/// Read-only view of a cached slot that counts as a user of its entry.
#[derive(Debug)]
pub struct CacheHandle {
    node: NodeId,
    slot: Arc<DataSlot>,
    users: Arc<AtomicUsize>,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheHandle {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn slot(&self) -> &Arc<DataSlot> {
        &self.slot
    }
}

impl Deref for CacheHandle {
    type Target = DataSlot;

    fn deref(&self) -> &DataSlot {
        &self.slot
    }
}

impl Clone for CacheHandle {
    fn clone(&self) -> Self {
        self.users.fetch_add(1, Ordering::SeqCst);
        Self {
            node: self.node,
            slot: self.slot.clone(),
            users: self.users.clone(),
            events: self.events.clone(),
        }
    }
}

impl Drop for CacheHandle {
    fn drop(&mut self) {
        if self.users.fetch_sub(1, Ordering::SeqCst) == 1 {
            CacheEntryReleased {
                node_id: &self.node,
                slot: self.slot.name(),
            }
            .log();
            let _ = self.events.send(CacheEvent::Released {
                node: self.node,
                slot: self.slot.name().to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Annotations, DataContext, DataType, TextData};

    fn slot(node: NodeId, name: &str, texts: &[&str]) -> Arc<DataSlot> {
        let mut slot = DataSlot::new(node, name, DataType::text());
        for text in texts {
            slot.add_row(TextData::item(*text), Annotations::new(), DataContext::default())
                .unwrap();
        }
        slot.seal();
        Arc::new(slot)
    }

    #[test]
    fn test_store_then_query_returns_same_rows() {
        let cache = MemoryCache::new();
        let node = NodeId::new();
        let stored = slot(node, "Output", &["a", "b"]);
        cache.store(node, None, stored.clone(), &ProgressInfo::detached());

        let found = cache.query(node, "Output").unwrap();
        assert!(Arc::ptr_eq(&found, &stored));
        assert_eq!(found.row_count(), 2);
        assert!(cache.query(node, "Other").is_none());
    }

    #[test]
    fn test_unsealed_slot_is_sealed_on_store() {
        let cache = MemoryCache::new();
        let node = NodeId::new();
        let open = Arc::new(DataSlot::new(node, "Output", DataType::text()));
        cache.store(node, None, open, &ProgressInfo::detached());
        assert!(cache.query(node, "Output").unwrap().is_sealed());
    }

    #[test]
    fn test_invalidate_removes_node_and_children() {
        let cache = MemoryCache::new();
        let progress = ProgressInfo::detached();
        let parent = NodeId::new();
        let child = NodeId::new();
        let other = NodeId::new();
        cache.store(parent, None, slot(parent, "Output", &["a"]), &progress);
        cache.store(child, Some(parent), slot(child, "Output", &["b"]), &progress);
        cache.store(other, None, slot(other, "Output", &["c"]), &progress);

        assert_eq!(cache.invalidate(parent), 2);
        assert!(cache.query(parent, "Output").is_none());
        assert!(cache.query(child, "Output").is_none());
        assert!(cache.query(other, "Output").is_some());
        assert_eq!(cache.invalidate(parent), 0);
    }

    #[test]
    fn test_handle_keeps_payload_alive_after_invalidation() {
        let cache = MemoryCache::new();
        let node = NodeId::new();
        cache.store(node, None, slot(node, "Output", &["kept"]), &ProgressInfo::detached());

        let handle = cache.acquire(node, "Output").unwrap();
        assert_eq!(cache.user_count(node, "Output"), 1);
        cache.invalidate(node);

        assert!(cache.query(node, "Output").is_none());
        assert_eq!(handle.row_count(), 1);
        assert_eq!(handle.rows()[0].item.summary(), "kept");
    }

    #[test]
    fn test_user_count_follows_handle_scope() {
        let cache = MemoryCache::new();
        let node = NodeId::new();
        cache.store(node, None, slot(node, "Output", &["a"]), &ProgressInfo::detached());
        let mut events = cache.subscribe();

        {
            let first = cache.acquire(node, "Output").unwrap();
            let second = first.clone();
            assert_eq!(cache.user_count(node, "Output"), 2);
            drop(first);
            assert_eq!(cache.user_count(node, "Output"), 1);
            drop(second);
        }
        assert_eq!(cache.user_count(node, "Output"), 0);
        assert_eq!(
            events.try_recv().unwrap(),
            CacheEvent::Released {
                node,
                slot: "Output".to_string()
            }
        );
    }

    #[test]
    fn test_acquire_unknown_entry() {
        let cache = MemoryCache::new();
        assert!(cache.acquire(NodeId::new(), "Output").is_none());
        assert_eq!(cache.user_count(NodeId::new(), "Output"), 0);
    }

    #[test]
    fn test_store_overwrites_and_clear_empties() {
        let cache = MemoryCache::new();
        let node = NodeId::new();
        let progress = ProgressInfo::detached();
        cache.store(node, None, slot(node, "Output", &["old"]), &progress);
        cache.store(node, None, slot(node, "Output", &["new", "rows"]), &progress);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.query(node, "Output").unwrap().row_count(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_if_current_refuses_after_invalidation() {
        let cache = MemoryCache::new();
        let progress = ProgressInfo::detached();
        let node = NodeId::new();
        let recorded = cache.generation(node);

        cache.invalidate(node);
        assert_eq!(cache.generation(node), recorded + 1);
        assert!(!cache.store_if_current(
            node,
            None,
            slot(node, "Output", &["stale"]),
            recorded,
            &progress
        ));
        assert!(!cache.contains(node, "Output"));

        assert!(cache.store_if_current(
            node,
            None,
            slot(node, "Output", &["fresh"]),
            cache.generation(node),
            &progress
        ));
        assert!(cache.contains(node, "Output"));
    }

    #[test]
    fn test_store_if_current_checks_parent_generation() {
        let cache = MemoryCache::new();
        let progress = ProgressInfo::detached();
        let origin = NodeId::new();
        let copy = NodeId::new();
        let recorded = cache.generations([origin, copy]);

        cache.invalidate(origin);
        assert!(!cache.store_if_current(
            copy,
            Some(origin),
            slot(copy, "Output", &["a"]),
            recorded[&origin],
            &progress
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_keeps_generation() {
        let cache = MemoryCache::new();
        let node = NodeId::new();
        cache.store(node, None, slot(node, "Output", &["a"]), &ProgressInfo::detached());

        assert_eq!(cache.evict(node), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.generation(node), 0);
    }
}
