// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for memory cache events.

use crate::graph::NodeId;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A slot was stored in the cache.
///
/// # Log Level
/// `debug!` - Cache bookkeeping
///
/// # Example
/// ```
/// use the_slotflow::graph::NodeId;
/// use the_slotflow::observability::messages::cache::SlotStored;
///
/// let id = NodeId::new();
/// let msg = SlotStored {
///     node_id: &id,
///     slot: "Output",
///     rows: 12,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct SlotStored<'a> {
    pub node_id: &'a NodeId,
    pub slot: &'a str,
    pub rows: usize,
}

impl Display for SlotStored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cached slot '{}' of node {} ({} rows)",
            self.slot, self.node_id, self.rows
        )
    }
}

impl StructuredLog for SlotStored<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = %self.node_id,
            slot = self.slot,
            rows = self.rows,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "cache_store",
            span_name = name,
            node_id = %self.node_id,
            slot = self.slot,
        )
    }
}

/// Entries of a node and its children were removed.
///
/// # Log Level
/// `debug!` - Cache bookkeeping
pub struct CacheInvalidated<'a> {
    pub node_id: &'a NodeId,
    pub removed: usize,
}

impl Display for CacheInvalidated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Invalidated {} cache entr{} for node {}",
            self.removed,
            if self.removed == 1 { "y" } else { "ies" },
            self.node_id
        )
    }
}

impl StructuredLog for CacheInvalidated<'_> {
    fn log(&self) {
        tracing::debug!(node_id = %self.node_id, removed = self.removed, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "cache_invalidate",
            span_name = name,
            node_id = %self.node_id,
            removed = self.removed,
        )
    }
}

/// The last user of a cache entry released it.
///
/// # Log Level
/// `trace!` - High-frequency detail
pub struct CacheEntryReleased<'a> {
    pub node_id: &'a NodeId,
    pub slot: &'a str,
}

impl Display for CacheEntryReleased<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Released cached slot '{}' of node {}",
            self.slot, self.node_id
        )
    }
}

impl StructuredLog for CacheEntryReleased<'_> {
    fn log(&self) {
        tracing::trace!(node_id = %self.node_id, slot = self.slot, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "cache_release",
            span_name = name,
            node_id = %self.node_id,
            slot = self.slot,
        )
    }
}

/// A run finished computing a slot after its node was invalidated, so the
/// result was not cached.
///
/// # Log Level
/// `info!` - The next run recomputes the node
pub struct StaleSlotDiscarded<'a> {
    pub node_id: &'a NodeId,
    pub slot: &'a str,
    pub recorded: u64,
    pub current: u64,
}

impl Display for StaleSlotDiscarded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Discarded slot '{}' of node {}: computed at generation {}, node is at {}",
            self.slot, self.node_id, self.recorded, self.current
        )
    }
}

impl StructuredLog for StaleSlotDiscarded<'_> {
    fn log(&self) {
        tracing::info!(
            node_id = %self.node_id,
            slot = self.slot,
            recorded = self.recorded,
            current = self.current,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "cache_discard",
            span_name = name,
            node_id = %self.node_id,
            slot = self.slot,
        )
    }
}
