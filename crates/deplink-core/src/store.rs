//! The persistent substrate: node/edge tables with upsert semantics,
//! filtered lookup, analyzer-scoped cleanup, and statistics.
//!
//! Secondary indexes are rebuilt on load rather than persisted; see
//! [`GraphStore::rebuild_indexes`].

use crate::cache::InferenceCache;
use crate::edge_types::{EdgeTypeDef, EdgeTypeRegistry, HierarchyError, UnknownEdgeType, names};
use crate::graph::{
    AnalysisSession, Edge, EdgeDraft, EdgeFilter, EdgeId, Node, NodeDraft, NodeFilter, NodeId,
    kinds,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Errors raised by the persistent layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database version mismatch: expected {expected}, found {found}")]
    Version { expected: String, found: String },
    #[error("database file is corrupt: {0}")]
    Corrupt(String),
    #[error("edge references missing node {0}")]
    MissingNode(NodeId),
    #[error(transparent)]
    UnknownEdgeType(#[from] UnknownEdgeType),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error("node draft has an empty identifier")]
    EmptyIdentifier,
    #[error("non-library node {identifier:?} has no source file")]
    MissingSourceFile { identifier: String },
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
    pub cache_entries: usize,
    pub sessions: usize,
}

/// The embedded property-graph store. Single writer, many readers:
/// every mutation takes `&mut self`, reads take `&self`; callers that
/// share across threads wrap the store in a lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStore {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    edge_types: EdgeTypeRegistry,
    pub(crate) cache: InferenceCache,
    sessions: Vec<AnalysisSession>,
    next_node_id: NodeId,
    next_edge_id: EdgeId,

    // Rebuilt on load and kept current by every mutation.
    #[serde(skip)]
    by_identifier: HashMap<String, NodeId>,
    #[serde(skip)]
    edges_from: HashMap<NodeId, Vec<EdgeId>>,
    #[serde(skip)]
    edges_to: HashMap<NodeId, Vec<EdgeId>>,
    #[serde(skip)]
    edges_by_file: HashMap<String, Vec<EdgeId>>,
}

impl GraphStore {
    /// Create an empty store over a validated registry. The predefined
    /// edge types are persisted with the store, so every edge write can
    /// be validated from the start.
    pub fn new(registry: EdgeTypeRegistry) -> Result<Self, StoreError> {
        let report = registry.validate();
        if let Some(err) = report.errors.into_iter().next() {
            return Err(StoreError::Hierarchy(err));
        }
        Ok(Self::from_registry(registry))
    }

    /// Empty store with the predefined taxonomy.
    pub fn with_default_types() -> Self {
        Self::from_registry(EdgeTypeRegistry::predefined())
    }

    fn from_registry(edge_types: EdgeTypeRegistry) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            edge_types,
            cache: InferenceCache::default(),
            sessions: Vec::new(),
            next_node_id: 1,
            next_edge_id: 1,
            by_identifier: HashMap::new(),
            edges_from: HashMap::new(),
            edges_to: HashMap::new(),
            edges_by_file: HashMap::new(),
        }
    }

    /// Rebuild the secondary indexes from the tables. Call after
    /// deserialization; mutations keep them current otherwise.
    pub fn rebuild_indexes(&mut self) {
        self.by_identifier.clear();
        self.edges_from.clear();
        self.edges_to.clear();
        self.edges_by_file.clear();
        for (id, node) in &self.nodes {
            self.by_identifier.insert(node.identifier.clone(), *id);
        }
        for (id, edge) in &self.edges {
            self.edges_from.entry(edge.from).or_default().push(*id);
            self.edges_to.entry(edge.to).or_default().push(*id);
            if let Some(file) = &edge.source_file {
                self.edges_by_file.entry(file.clone()).or_default().push(*id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn edge_types(&self) -> &EdgeTypeRegistry {
        &self.edge_types
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_by_identifier(&self, identifier: &str) -> Option<&Node> {
        self.by_identifier
            .get(identifier)
            .and_then(|id| self.nodes.get(id))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn find_nodes(&self, filter: &NodeFilter) -> Vec<&Node> {
        self.nodes.values().filter(|n| filter.matches(n)).collect()
    }

    pub fn find_edges(&self, filter: &EdgeFilter) -> Vec<&Edge> {
        // Pinned endpoints go through the indexes; everything else scans.
        if let Some(from) = filter.from {
            return self
                .edge_ids_from(from)
                .filter_map(|id| self.edges.get(&id))
                .filter(|e| filter.matches(e))
                .collect();
        }
        if let Some(to) = filter.to {
            return self
                .edge_ids_to(to)
                .filter_map(|id| self.edges.get(&id))
                .filter(|e| filter.matches(e))
                .collect();
        }
        self.edges.values().filter(|e| filter.matches(e)).collect()
    }

    /// All edges leaving `node`, sorted by `(to, id)` for determinism.
    pub fn outgoing_edges(&self, node: NodeId) -> Vec<&Edge> {
        let mut out: Vec<&Edge> = self
            .edge_ids_from(node)
            .filter_map(|id| self.edges.get(&id))
            .collect();
        out.sort_by_key(|e| (e.to, e.id));
        out
    }

    /// All edges entering `node`, sorted by `(from, id)`.
    pub fn incoming_edges(&self, node: NodeId) -> Vec<&Edge> {
        let mut out: Vec<&Edge> = self
            .edge_ids_to(node)
            .filter_map(|id| self.edges.get(&id))
            .collect();
        out.sort_by_key(|e| (e.from, e.id));
        out
    }

    /// Outgoing neighbors through the given edge types (all types when
    /// empty), deduplicated and sorted by node id.
    pub fn dependencies_of(&self, node: NodeId, types: &[String]) -> Vec<&Node> {
        let mut ids: Vec<NodeId> = self
            .outgoing_edges(node)
            .into_iter()
            .filter(|e| types.is_empty() || types.iter().any(|t| *t == e.edge_type))
            .map(|e| e.to)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().filter_map(|id| self.nodes.get(&id)).collect()
    }

    /// Incoming neighbors through the given edge types.
    pub fn dependents_of(&self, node: NodeId, types: &[String]) -> Vec<&Node> {
        let mut ids: Vec<NodeId> = self
            .incoming_edges(node)
            .into_iter()
            .filter(|e| types.is_empty() || types.iter().any(|t| *t == e.edge_type))
            .map(|e| e.from)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().filter_map(|id| self.nodes.get(&id)).collect()
    }

    fn edge_ids_from(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges_from.get(&node).into_iter().flatten().copied()
    }

    fn edge_ids_to(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges_to.get(&node).into_iter().flatten().copied()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Merge a node by identifier: the existing id and `created_at` are
    /// preserved, mutable fields are updated, metadata keys are merged
    /// with new values winning.
    pub fn upsert_node(&mut self, draft: NodeDraft) -> Result<NodeId, StoreError> {
        if draft.identifier.trim().is_empty() {
            return Err(StoreError::EmptyIdentifier);
        }
        if draft.source_file.is_empty() && draft.kind != kinds::LIBRARY {
            return Err(StoreError::MissingSourceFile {
                identifier: draft.identifier,
            });
        }
        let now = Utc::now();
        if let Some(&id) = self.by_identifier.get(&draft.identifier) {
            let Some(node) = self.nodes.get_mut(&id) else {
                return Err(StoreError::Corrupt(format!(
                    "identifier index points at missing node {id}"
                )));
            };
            node.kind = draft.kind;
            node.name = draft.name;
            node.source_file = draft.source_file;
            node.language = draft.language;
            if !draft.semantic_tags.is_empty() {
                node.semantic_tags = draft.semantic_tags;
            }
            for (key, value) in draft.metadata {
                node.metadata.insert(key, value);
            }
            if draft.span.is_some() {
                node.span = draft.span;
            }
            node.updated_at = now;
            return Ok(id);
        }
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.by_identifier.insert(draft.identifier.clone(), id);
        self.nodes.insert(
            id,
            Node {
                id,
                identifier: draft.identifier,
                kind: draft.kind,
                name: draft.name,
                source_file: draft.source_file,
                language: draft.language,
                semantic_tags: draft.semantic_tags,
                metadata: draft.metadata,
                span: draft.span,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    /// Merge an edge by `(from, to, type)`: metadata, weight, label and
    /// attribution are replaced. Cache rows touching either endpoint
    /// are invalidated, insert or update alike.
    pub fn upsert_edge(&mut self, draft: EdgeDraft) -> Result<EdgeId, StoreError> {
        self.edge_types.require(&draft.edge_type)?;
        if !self.nodes.contains_key(&draft.from) {
            return Err(StoreError::MissingNode(draft.from));
        }
        if !self.nodes.contains_key(&draft.to) {
            return Err(StoreError::MissingNode(draft.to));
        }
        let now = Utc::now();
        let existing = self
            .edge_ids_from(draft.from)
            .find(|id| {
                self.edges
                    .get(id)
                    .is_some_and(|e| e.to == draft.to && e.edge_type == draft.edge_type)
            });
        let id = match existing {
            Some(id) => {
                let old_file = self.edges.get(&id).and_then(|e| e.source_file.clone());
                if old_file != draft.source_file {
                    if let Some(old) = &old_file {
                        Self::detach(&mut self.edges_by_file, old, id);
                    }
                    if let Some(new) = &draft.source_file {
                        self.edges_by_file.entry(new.clone()).or_default().push(id);
                    }
                }
                if let Some(edge) = self.edges.get_mut(&id) {
                    edge.label = draft.label;
                    edge.metadata = draft.metadata;
                    edge.weight = draft.weight;
                    edge.source_file = draft.source_file;
                    edge.updated_at = now;
                }
                id
            }
            None => {
                let id = self.next_edge_id;
                self.next_edge_id += 1;
                self.edges_from.entry(draft.from).or_default().push(id);
                self.edges_to.entry(draft.to).or_default().push(id);
                if let Some(file) = &draft.source_file {
                    self.edges_by_file.entry(file.clone()).or_default().push(id);
                }
                self.edges.insert(
                    id,
                    Edge {
                        id,
                        from: draft.from,
                        to: draft.to,
                        edge_type: draft.edge_type,
                        label: draft.label,
                        metadata: draft.metadata,
                        weight: draft.weight,
                        source_file: draft.source_file,
                        created_at: now,
                        updated_at: now,
                    },
                );
                id
            }
        };
        self.cache.invalidate_pair(draft.from, draft.to);
        Ok(id)
    }

    /// Delete an edge, detaching it from every index and dropping cache
    /// rows that touched its endpoints.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&id)?;
        Self::detach(&mut self.edges_from, &edge.from, id);
        Self::detach(&mut self.edges_to, &edge.to, id);
        if let Some(file) = &edge.source_file {
            Self::detach(&mut self.edges_by_file, file, id);
        }
        self.cache.invalidate_pair(edge.from, edge.to);
        Some(edge)
    }

    /// Delete a node; incident edges and cache rows cascade.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.by_identifier.remove(&node.identifier);
        let mut incident: Vec<EdgeId> = self.edge_ids_from(id).chain(self.edge_ids_to(id)).collect();
        incident.sort_unstable();
        incident.dedup();
        for eid in incident {
            self.remove_edge(eid);
        }
        self.edges_from.remove(&id);
        self.edges_to.remove(&id);
        self.cache.invalidate_node(id);
        Some(node)
    }

    /// Delete every edge whose `source_file` equals the argument and
    /// whose type is in the given set: the idempotent-re-ingestion
    /// contract. Edges of other types, other files, or with no
    /// attribution at all are untouched.
    pub fn cleanup_by_source_and_types(&mut self, source_file: &str, types: &[String]) -> usize {
        let doomed: Vec<EdgeId> = self
            .edges_by_file
            .get(source_file)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| {
                self.edges
                    .get(id)
                    .is_some_and(|e| types.iter().any(|t| *t == e.edge_type))
            })
            .collect();
        for id in &doomed {
            self.remove_edge(*id);
        }
        if !doomed.is_empty() {
            tracing::debug!("removed {} stale edges owned by {}", doomed.len(), source_file);
        }
        doomed.len()
    }

    /// Insert an edge-type definition if absent. A no-op on identical
    /// duplicates; a conflicting duplicate is an error, and existing
    /// definitions are never silently overwritten.
    pub fn register_edge_type(&mut self, def: EdgeTypeDef) -> Result<bool, StoreError> {
        Ok(self.edge_types.register(def)?)
    }

    /// Admin path for changing an existing type's flags or parentage.
    /// Every cached inference is dropped: any derivation may depend on
    /// the old semantics.
    pub fn redefine_edge_type(&mut self, def: EdgeTypeDef) -> Result<(), StoreError> {
        self.edge_types.redefine(def)?;
        self.cache.clear();
        tracing::debug!("edge-type redefinition cleared the inference cache");
        Ok(())
    }

    /// Append one analyzer session to the database's ingestion log.
    pub fn record_session(&mut self, session: AnalysisSession) {
        self.sessions.push(session);
    }

    pub fn sessions(&self) -> &[AnalysisSession] {
        &self.sessions
    }

    // ------------------------------------------------------------------
    // Statistics and derived views
    // ------------------------------------------------------------------

    /// Exact counts recomputed from the tables.
    pub fn statistics(&self) -> GraphStatistics {
        let mut nodes_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for node in self.nodes.values() {
            *nodes_by_kind.entry(node.kind.clone()).or_default() += 1;
        }
        let mut edges_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for edge in self.edges.values() {
            *edges_by_type.entry(edge.edge_type.clone()).or_default() += 1;
        }
        GraphStatistics {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            nodes_by_kind,
            edges_by_type,
            cache_entries: self.cache.len(),
            sessions: self.sessions.len(),
        }
    }

    /// File nodes that do not exist on disk but are imported by
    /// something: the unresolved ends of the graph.
    pub fn missing_links(&self) -> Vec<&Node> {
        let mut ids: Vec<NodeId> = self
            .edges
            .values()
            .filter(|e| e.edge_type == names::IMPORTS_FILE)
            .filter_map(|e| self.nodes.get(&e.to))
            .filter(|n| {
                n.metadata
                    .get("exists")
                    .and_then(serde_json::Value::as_bool)
                    == Some(false)
            })
            .map(|n| n.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().filter_map(|id| self.nodes.get(&id)).collect()
    }

    fn detach<K: std::hash::Hash + Eq>(
        index: &mut HashMap<K, Vec<EdgeId>>,
        key: &K,
        id: EdgeId,
    ) {
        if let Some(ids) = index.get_mut(key) {
            ids.retain(|e| *e != id);
            if ids.is_empty() {
                index.remove(key);
            }
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::with_default_types()
    }
}
