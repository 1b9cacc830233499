//! Derived relationship queries: hierarchical expansion, transitive
//! closure, and inheritable projection over the direct edge tables.
//!
//! Traversals run in the host language against the store's direct
//! query API; results are deterministic and bounded by depth and an
//! optional wall-clock budget.

use crate::cache::CacheEntry;
use crate::config::TraversalConfig;
use crate::edge_types::{UnknownEdgeType, names};
use crate::graph::{Edge, EdgeFilter, EdgeId, NodeId};
use crate::store::GraphStore;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

/// The caller asked for a derivation the type does not support.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    #[error("edge type {0:?} is not transitive")]
    NotTransitive(String),
    #[error("edge type {0:?} is not inheritable")]
    NotInheritable(String),
    #[error(transparent)]
    UnknownEdgeType(#[from] UnknownEdgeType),
}

/// A relationship produced by inference rather than stored directly.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: String,
    /// Number of direct edges combined; 1 means the edge is stored.
    pub depth: u32,
    /// Ids of the direct edges along the derivation path.
    pub edge_path: Vec<EdgeId>,
}

/// Options for bounded traversals.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub max_depth: u32,
    /// Follow hierarchical descendants of the requested type as well
    /// (the leaf-write/expanded-read convention).
    pub expand_descendants: bool,
    /// Wall-clock cap; exceeding it truncates the result, it is not an
    /// error.
    pub time_budget: Option<Duration>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            expand_descendants: true,
            time_budget: None,
        }
    }
}

impl From<&TraversalConfig> for TraversalOptions {
    fn from(config: &TraversalConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            expand_descendants: true,
            time_budget: config.time_budget_ms.map(Duration::from_millis),
        }
    }
}

/// Flags for [`InferenceEngine::query_hierarchical`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchicalOptions {
    pub include_children: bool,
    pub include_parents: bool,
}

impl HierarchicalOptions {
    /// The common case: a type plus everything below it.
    pub fn with_children() -> Self {
        Self {
            include_children: true,
            include_parents: false,
        }
    }
}

/// Result of a bounded derivation query.
#[derive(Debug, Clone, Default)]
pub struct Derivations {
    /// Sorted by `(depth, to)`.
    pub edges: Vec<DerivedEdge>,
    /// True when `max_depth` or the time budget cut the traversal
    /// short of the full closure.
    pub truncated: bool,
}

/// Direct plus derived relationships for a node.
#[derive(Debug, Clone, Default)]
pub struct InferenceSummary {
    pub direct: Vec<Edge>,
    pub inferred: Vec<DerivedEdge>,
    pub truncated: bool,
}

/// Options for [`InferenceEngine::infer_all`].
#[derive(Debug, Clone)]
pub struct InferAllOptions {
    /// Restrict to these types; None means every registered type.
    pub types: Option<Vec<String>>,
    pub max_depth: u32,
    pub time_budget: Option<Duration>,
}

impl Default for InferAllOptions {
    fn default() -> Self {
        Self {
            types: None,
            max_depth: 10,
            time_budget: None,
        }
    }
}

/// Answers relationship queries that go beyond directly stored edges.
/// Holds the store exclusively so derivations can be memoized.
pub struct InferenceEngine<'a> {
    store: &'a mut GraphStore,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(store: &'a mut GraphStore) -> Self {
        Self { store }
    }

    /// Stored edges of `edge_type`, widened to descendants and/or
    /// ancestors of the type per the flags. Sorted by edge id.
    pub fn query_hierarchical(
        &self,
        edge_type: &str,
        opts: HierarchicalOptions,
    ) -> Result<Vec<Edge>, InferenceError> {
        let registry = self.store.edge_types();
        registry.require(edge_type)?;
        let mut wanted: Vec<String> = vec![edge_type.to_string()];
        if opts.include_children {
            wanted.extend(registry.descendants_of(edge_type));
        }
        if opts.include_parents {
            wanted.extend(
                registry
                    .ancestors_of(edge_type)
                    .into_iter()
                    .skip(1)
                    .map(str::to_string),
            );
        }
        let mut edges: Vec<Edge> = self
            .store
            .find_edges(&EdgeFilter::of_types(wanted))
            .into_iter()
            .cloned()
            .collect();
        edges.sort_by_key(|e| e.id);
        Ok(edges)
    }

    /// Transitive closure from `start` over `edge_type`: derived edges
    /// `(start -> reached, edge_type, depth, path)` for every node a
    /// chain of matching edges reaches. Only valid when the type or one
    /// of its ancestors is transitive.
    pub fn query_transitive(
        &mut self,
        start: NodeId,
        edge_type: &str,
        opts: &TraversalOptions,
    ) -> Result<Derivations, InferenceError> {
        let registry = self.store.edge_types();
        registry.require(edge_type)?;
        if !registry.is_transitive(edge_type) {
            return Err(InferenceError::NotTransitive(edge_type.to_string()));
        }
        let followed = self.followed_types(edge_type, opts.expand_descendants);

        if let Some((hits, deeper)) = self.store.cache.lookup_from(start, edge_type, opts.max_depth)
        {
            let mut edges: Vec<DerivedEdge> = hits
                .into_iter()
                .map(|e| DerivedEdge {
                    from: e.from,
                    to: e.to,
                    edge_type: e.inferred_type.clone(),
                    depth: e.depth,
                    edge_path: e.edge_path.clone(),
                })
                .collect();
            edges.extend(self.direct_layer(start, edge_type, &followed));
            sort_derived(&mut edges);
            return Ok(Derivations {
                edges,
                truncated: deeper,
            });
        }

        let (derived, paths, truncated, budget_hit) =
            self.walk_transitive(start, edge_type, &followed, opts);

        // Memoize multi-hop derivations; coverage only when the budget
        // did not break the walk early.
        let now = Utc::now();
        for (edge, nodes) in derived.iter().zip(&paths) {
            if edge.depth >= 2 {
                self.store.cache.insert(CacheEntry {
                    from: edge.from,
                    to: edge.to,
                    inferred_type: edge.edge_type.clone(),
                    edge_path: edge.edge_path.clone(),
                    path_nodes: nodes.clone(),
                    depth: edge.depth,
                    computed_at: now,
                });
            }
        }
        if !budget_hit {
            self.store
                .cache
                .mark_complete(start, edge_type, opts.max_depth, truncated);
        }

        let mut edges = derived;
        sort_derived(&mut edges);
        Ok(Derivations { edges, truncated })
    }

    /// Project relationships of contained entities onto their
    /// container: `start contains B`, `B -r-> C` derives
    /// `start -r-> C`. Only valid when `edge_type` (or an ancestor) is
    /// inheritable. Derivations are recomputed on every call; depth
    /// counts the containment hops plus the projected edge.
    pub fn query_inheritable(
        &mut self,
        start: NodeId,
        edge_type: &str,
        opts: &TraversalOptions,
    ) -> Result<Derivations, InferenceError> {
        let registry = self.store.edge_types();
        registry.require(edge_type)?;
        if !registry.is_inheritable(edge_type) {
            return Err(InferenceError::NotInheritable(edge_type.to_string()));
        }
        let containment = registry.expand_with_descendants(names::CONTAINS);
        let projected = self.followed_types(edge_type, opts.expand_descendants);

        let started = Instant::now();
        let mut edges: Vec<DerivedEdge> = Vec::new();
        let mut truncated = false;
        let mut visited: HashSet<NodeId> = HashSet::from([start]);
        // (node, containment hops so far, edge ids, nodes on the path)
        let mut queue: VecDeque<(NodeId, u32, Vec<EdgeId>, Vec<NodeId>)> =
            VecDeque::from([(start, 0, Vec::new(), vec![start])]);

        while let Some((node, hops, path, path_nodes)) = queue.pop_front() {
            if let Some(budget) = opts.time_budget
                && started.elapsed() > budget
            {
                truncated = true;
                break;
            }
            if node != start {
                // project the contained entity's direct relations
                for edge in self.store.outgoing_edges(node) {
                    if !projected.iter().any(|t| *t == edge.edge_type) {
                        continue;
                    }
                    if edge.to == start {
                        continue;
                    }
                    let mut edge_path = path.clone();
                    edge_path.push(edge.id);
                    edges.push(DerivedEdge {
                        from: start,
                        to: edge.to,
                        edge_type: edge_type.to_string(),
                        depth: hops + 1,
                        edge_path,
                    });
                }
            }
            if hops + 1 > opts.max_depth.saturating_sub(1) {
                if self
                    .store
                    .outgoing_edges(node)
                    .iter()
                    .any(|e| containment.iter().any(|t| *t == e.edge_type))
                {
                    truncated = true;
                }
                continue;
            }
            for edge in self.store.outgoing_edges(node) {
                if !containment.iter().any(|t| *t == edge.edge_type) {
                    continue;
                }
                if !visited.insert(edge.to) {
                    continue;
                }
                let mut new_path = path.clone();
                new_path.push(edge.id);
                let mut new_nodes = path_nodes.clone();
                new_nodes.push(edge.to);
                queue.push_back((edge.to, hops + 1, new_path, new_nodes));
            }
        }

        // collapse duplicates, keep minimum depth
        edges.sort_by(|a, b| {
            (a.to, a.depth, &a.edge_path).cmp(&(b.to, b.depth, &b.edge_path))
        });
        edges.dedup_by(|a, b| a.to == b.to);
        sort_derived(&mut edges);
        Ok(Derivations { edges, truncated })
    }

    /// Direct edges bundled with every applicable derivation,
    /// duplicates collapsed on `(from, to, type)` keeping the minimum
    /// depth.
    pub fn infer_all(
        &mut self,
        node: NodeId,
        opts: &InferAllOptions,
    ) -> Result<InferenceSummary, InferenceError> {
        let registry = self.store.edge_types();
        let types: Vec<String> = match &opts.types {
            Some(types) => {
                for t in types {
                    registry.require(t)?;
                }
                types.clone()
            }
            None => registry.all().map(|d| d.name.clone()).collect(),
        };

        let mut direct: Vec<Edge> = self
            .store
            .outgoing_edges(node)
            .into_iter()
            .filter(|e| types.iter().any(|t| *t == e.edge_type))
            .cloned()
            .collect();
        direct.sort_by_key(|e| e.id);

        let traversal = TraversalOptions {
            max_depth: opts.max_depth,
            expand_descendants: true,
            time_budget: opts.time_budget,
        };
        let mut inferred: Vec<DerivedEdge> = Vec::new();
        let mut truncated = false;
        for ty in &types {
            if self.store.edge_types().is_transitive(ty) {
                let result = self.query_transitive(node, ty, &traversal)?;
                truncated |= result.truncated;
                inferred.extend(result.edges);
            }
            if self.store.edge_types().is_inheritable(ty) {
                let result = self.query_inheritable(node, ty, &traversal)?;
                truncated |= result.truncated;
                inferred.extend(result.edges);
            }
        }

        inferred.sort_by(|a, b| {
            (a.from, a.to, &a.edge_type, a.depth).cmp(&(b.from, b.to, &b.edge_type, b.depth))
        });
        inferred.dedup_by(|a, b| a.from == b.from && a.to == b.to && a.edge_type == b.edge_type);
        sort_derived(&mut inferred);
        Ok(InferenceSummary {
            direct,
            inferred,
            truncated,
        })
    }

    /// The stored edge types a query over `edge_type` follows.
    fn followed_types(&self, edge_type: &str, expand_descendants: bool) -> Vec<String> {
        if expand_descendants {
            self.store.edge_types().expand_with_descendants(edge_type)
        } else {
            vec![edge_type.to_string()]
        }
    }

    /// Depth-1 rows are never cached; rebuild them from the store.
    /// One row per reached node, matching what the closure walk emits.
    fn direct_layer(&self, start: NodeId, edge_type: &str, followed: &[String]) -> Vec<DerivedEdge> {
        let mut rows: Vec<DerivedEdge> = self
            .store
            .outgoing_edges(start)
            .into_iter()
            .filter(|e| followed.iter().any(|t| *t == e.edge_type))
            .filter(|e| e.to != start)
            .map(|e| DerivedEdge {
                from: start,
                to: e.to,
                edge_type: edge_type.to_string(),
                depth: 1,
                edge_path: vec![e.id],
            })
            .collect();
        rows.sort_by(|a, b| (a.to, &a.edge_path).cmp(&(b.to, &b.edge_path)));
        rows.dedup_by(|a, b| a.to == b.to);
        rows
    }

    /// Breadth-first closure walk. Returns the derivations, the node
    /// path backing each one, whether the result was cut short, and
    /// whether the cut came from the time budget.
    fn walk_transitive(
        &self,
        start: NodeId,
        edge_type: &str,
        followed: &[String],
        opts: &TraversalOptions,
    ) -> (Vec<DerivedEdge>, Vec<Vec<NodeId>>, bool, bool) {
        let started = Instant::now();
        let mut derived: Vec<DerivedEdge> = Vec::new();
        let mut paths: Vec<Vec<NodeId>> = Vec::new();
        let mut truncated = false;
        let mut budget_hit = false;
        let mut visited: HashSet<NodeId> = HashSet::from([start]);
        let mut queue: VecDeque<(NodeId, u32, Vec<EdgeId>, Vec<NodeId>)> =
            VecDeque::from([(start, 0, Vec::new(), vec![start])]);

        while let Some((node, depth, path, path_nodes)) = queue.pop_front() {
            if let Some(budget) = opts.time_budget
                && started.elapsed() > budget
            {
                truncated = true;
                budget_hit = true;
                break;
            }
            for edge in self.store.outgoing_edges(node) {
                if !followed.iter().any(|t| *t == edge.edge_type) {
                    continue;
                }
                if visited.contains(&edge.to) {
                    continue;
                }
                if depth + 1 > opts.max_depth {
                    truncated = true;
                    continue;
                }
                visited.insert(edge.to);
                let mut new_path = path.clone();
                new_path.push(edge.id);
                let mut new_nodes = path_nodes.clone();
                new_nodes.push(edge.to);
                derived.push(DerivedEdge {
                    from: start,
                    to: edge.to,
                    edge_type: edge_type.to_string(),
                    depth: depth + 1,
                    edge_path: new_path.clone(),
                });
                paths.push(new_nodes.clone());
                queue.push_back((edge.to, depth + 1, new_path, new_nodes));
            }
        }
        (derived, paths, truncated, budget_hit)
    }
}

/// Deterministic output order for derived rows.
fn sort_derived(edges: &mut [DerivedEdge]) {
    edges.sort_by(|a, b| (a.depth, a.to, &a.edge_type).cmp(&(b.depth, b.to, &b.edge_type)));
}
