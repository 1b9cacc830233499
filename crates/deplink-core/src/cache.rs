//! Derived-edge cache: memoized inference results with endpoint-based
//! invalidation.

use crate::graph::{EdgeId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A memoized derivation. `(from, to, inferred_type)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub from: NodeId,
    pub to: NodeId,
    pub inferred_type: String,
    /// Direct-edge ids along the derivation path, in traversal order.
    pub edge_path: Vec<EdgeId>,
    /// Every node on the derivation path, endpoints included.
    /// Invalidation matches on these, so it stays correct after the
    /// underlying edge rows are already gone.
    pub path_nodes: Vec<NodeId>,
    /// Number of direct edges combined; always >= 2 here (depth 1 is a
    /// stored edge and is never cached).
    pub depth: u32,
    pub computed_at: DateTime<Utc>,
}

/// Completeness of one memoized traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Coverage {
    /// Depth up to which every derivation is cached.
    depth: u32,
    /// Whether the producing traversal was cut at `depth` with more
    /// graph beyond it.
    cut_beyond: bool,
}

/// The inference cache. Entries persist with the store; the coverage
/// markers that gate reads are in-memory only, so a reloaded database
/// recomputes lazily (crash recovery is "rebuild on demand").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceCache {
    entries: Vec<CacheEntry>,
    #[serde(skip)]
    coverage: HashMap<(NodeId, String), Coverage>,
}

impl InferenceCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Insert or replace the entry for `(from, to, inferred_type)`.
    pub fn insert(&mut self, entry: CacheEntry) {
        match self.entries.iter_mut().find(|e| {
            e.from == entry.from && e.to == entry.to && e.inferred_type == entry.inferred_type
        }) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Record that every derivation from `from` over `inferred_type` up
    /// to `depth` is now cached.
    pub fn mark_complete(&mut self, from: NodeId, inferred_type: &str, depth: u32, cut_beyond: bool) {
        self.coverage
            .insert((from, inferred_type.to_string()), Coverage { depth, cut_beyond });
    }

    /// Cached derivations from `from` over `inferred_type`, if a prior
    /// traversal covered at least `max_depth`. The bool reports whether
    /// deeper derivations exist past `max_depth`.
    pub fn lookup_from(
        &self,
        from: NodeId,
        inferred_type: &str,
        max_depth: u32,
    ) -> Option<(Vec<&CacheEntry>, bool)> {
        let coverage = *self.coverage.get(&(from, inferred_type.to_string()))?;
        if coverage.depth < max_depth {
            return None;
        }
        let mut hits = Vec::new();
        let mut deeper = coverage.cut_beyond;
        for entry in &self.entries {
            if entry.from != from || entry.inferred_type != inferred_type {
                continue;
            }
            if entry.depth <= max_depth {
                hits.push(entry);
            } else {
                deeper = true;
            }
        }
        Some((hits, deeper))
    }

    /// Drop every entry whose derivation path touches `node`.
    /// Coverage markers are cleared wholesale: a mutation anywhere can
    /// extend a traversal frontier somewhere else.
    pub fn invalidate_node(&mut self, node: NodeId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.path_nodes.contains(&node));
        self.coverage.clear();
        before - self.entries.len()
    }

    /// Drop every entry whose derivation path touches either endpoint
    /// of a mutated edge.
    pub fn invalidate_pair(&mut self, u: NodeId, v: NodeId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !e.path_nodes.contains(&u) && !e.path_nodes.contains(&v));
        self.coverage.clear();
        before - self.entries.len()
    }

    /// Drop everything. Required after any edge-type flag change.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.coverage.clear();
    }
}
