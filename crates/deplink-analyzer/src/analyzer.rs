//! Per-file ingestion: translate extracted imports into graph nodes
//! and typed edges, idempotently.

use crate::import_source::{ImportKind, ImportSource};
use crate::language::Language;
use crate::resolve::{PathResolver, ResolutionError};
use chrono::Utc;
use deplink_core::edge_types::names;
use deplink_core::graph::{AnalysisSession, EdgeDraft, EdgeId, NodeDraft, NodeId, kinds};
use deplink_core::identity;
use deplink_core::store::{GraphStore, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// Edge types this analyzer owns. Scoped cleanup deletes exactly these
/// for the analyzed file, so extending the set is a versioned
/// migration: cleanup defines ownership.
pub const OWNED_EDGE_TYPES: [&str; 2] = [names::IMPORTS_FILE, names::IMPORTS_LIBRARY];

/// Failures surfaced by the ingestion pipeline. Unresolved import
/// targets are not failures; they come back as missing links.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("store error while analyzing {file}: {source}")]
    Store {
        file: String,
        #[source]
        source: StoreError,
    },
    #[error("malformed import in {file}: {source}")]
    Resolution {
        file: String,
        #[source]
        source: ResolutionError,
    },
}

/// Why a target ended up in `missing_links`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingLinkKind {
    FileNotFound,
}

/// An import whose resolved target does not exist on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingLink {
    pub source_file: String,
    /// The specifier as written in the import.
    pub specifier: String,
    /// The path resolution settled on.
    pub resolved_path: String,
    #[serde(rename = "type")]
    pub kind: MissingLinkKind,
}

/// Counts for one `analyze` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub imports_total: usize,
    pub file_targets: usize,
    pub library_targets: usize,
}

/// Outcome of analyzing one file.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Normalized project-relative path of the analyzed file.
    pub source_file: String,
    /// Ids of nodes upserted during this call, source first.
    pub created_nodes: Vec<NodeId>,
    /// Ids of edges written during this call.
    pub created_edges: Vec<EdgeId>,
    /// One entry per import whose target does not exist.
    pub missing_links: Vec<MissingLink>,
    pub stats: AnalysisStats,
}

/// Maps parsed imports to nodes and edges, one file at a time.
///
/// Re-analysis is idempotent: the pipeline first deletes every edge it
/// previously wrote for the file (scoped to [`OWNED_EDGE_TYPES`]) and
/// then rebuilds, so the outcome is as if the file's prior edges never
/// existed alongside the new ones. Edges owned by other analyzers or
/// other files are never touched.
#[derive(Debug, Clone)]
pub struct FileDependencyAnalyzer {
    resolver: PathResolver,
    root: String,
    owned: Vec<String>,
}

impl FileDependencyAnalyzer {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let root_path = project_root.into();
        let root = root_path.to_string_lossy().into_owned();
        Self {
            resolver: PathResolver::new(root_path),
            root,
            owned: OWNED_EDGE_TYPES.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    /// Override the owned edge-type set. This is a versioned migration
    /// step, not a per-call option.
    pub fn with_owned_edge_types(mut self, owned: Vec<String>) -> Self {
        self.owned = owned;
        self
    }

    pub fn owned_edge_types(&self) -> &[String] {
        &self.owned
    }

    /// Run the per-file pipeline: scoped cleanup, source-node upsert,
    /// target resolution, edge emission.
    pub fn analyze(
        &self,
        store: &mut GraphStore,
        path: &str,
        language: Language,
        imports: &[ImportSource],
    ) -> Result<AnalysisResult, AnalyzerError> {
        let started = Utc::now();
        let source_path = identity::normalize(path, Some(&self.root));

        // 1. Scoped cleanup; everything this analyzer wrote for the
        // file in a previous run goes away, and nothing else.
        store.cleanup_by_source_and_types(&source_path, &self.owned);

        let mut created_nodes: Vec<NodeId> = Vec::new();
        let mut created_edges: Vec<EdgeId> = Vec::new();
        let mut missing_links: Vec<MissingLink> = Vec::new();
        let mut stats = AnalysisStats::default();

        // 2. Source node.
        let source_id = self
            .upsert_file_node(store, &source_path, language, self.resolver.exists(&source_path), true)
            .map_err(|e| self.store_error(&source_path, e))?;
        push_unique(&mut created_nodes, source_id);

        // 3 + 4. Resolve each import and emit its edge.
        for import in imports {
            stats.imports_total += 1;
            let (target_id, edge_type) = if import.kind.is_external() {
                stats.library_targets += 1;
                let id = self
                    .upsert_library_node(store, language, import)
                    .map_err(|e| self.store_error(&source_path, e))?;
                (id, names::IMPORTS_LIBRARY)
            } else {
                stats.file_targets += 1;
                let resolved = self
                    .resolver
                    .resolve_file_target(&source_path, &import.source, import.kind, language)
                    .map_err(|e| AnalyzerError::Resolution {
                        file: source_path.clone(),
                        source: e,
                    })?;
                if !resolved.exists {
                    missing_links.push(MissingLink {
                        source_file: source_path.clone(),
                        specifier: import.source.clone(),
                        resolved_path: resolved.path.clone(),
                        kind: MissingLinkKind::FileNotFound,
                    });
                }
                let id = self
                    .upsert_file_node(store, &resolved.path, language, resolved.exists, false)
                    .map_err(|e| self.store_error(&source_path, e))?;
                (id, names::IMPORTS_FILE)
            };
            push_unique(&mut created_nodes, target_id);

            let draft = self.edge_draft(source_id, target_id, edge_type, &source_path, import);
            let edge_id = store
                .upsert_edge(draft)
                .map_err(|e| self.store_error(&source_path, e))?;
            created_edges.push(edge_id);
        }

        // 5. Session log.
        store.record_session(AnalysisSession {
            source_file: source_path.clone(),
            language: language.name().to_string(),
            nodes_upserted: created_nodes.len(),
            edges_created: created_edges.len(),
            missing_links: missing_links.len(),
            started_at: started,
            finished_at: Utc::now(),
        });
        tracing::debug!(
            "analyzed {}: {} imports, {} missing links",
            source_path,
            imports.len(),
            missing_links.len()
        );

        Ok(AnalysisResult {
            source_file: source_path,
            created_nodes,
            created_edges,
            missing_links,
            stats,
        })
    }

    fn upsert_file_node(
        &self,
        store: &mut GraphStore,
        project_relative: &str,
        language: Language,
        exists: bool,
        analyzed_now: bool,
    ) -> Result<NodeId, StoreError> {
        let name = identity::basename(project_relative).to_string();
        let mut draft = NodeDraft::new(identity::file_id(project_relative, None), kinds::FILE, name)
            .source_file(project_relative)
            .language(language.name())
            .metadata_entry("exists", Value::Bool(exists))
            .metadata_entry("path", Value::String(project_relative.to_string()));
        if analyzed_now {
            draft = draft.metadata_entry("last_analyzed", Value::String(Utc::now().to_rfc3339()));
        }
        store.upsert_node(draft)
    }

    fn upsert_library_node(
        &self,
        store: &mut GraphStore,
        language: Language,
        import: &ImportSource,
    ) -> Result<NodeId, StoreError> {
        let items: Vec<Value> = import
            .symbols
            .iter()
            .map(|s| Value::String(s.name.clone()))
            .collect();
        let draft = NodeDraft::new(
            identity::library_id(&import.source),
            kinds::LIBRARY,
            import.source.clone(),
        )
        .language(language.name())
        .metadata_entry("is_builtin", Value::Bool(import.kind == ImportKind::Builtin))
        .metadata_entry("items", Value::Array(items));
        store.upsert_node(draft)
    }

    fn edge_draft(
        &self,
        from: NodeId,
        to: NodeId,
        edge_type: &str,
        source_path: &str,
        import: &ImportSource,
    ) -> EdgeDraft {
        let mut draft = EdgeDraft::new(from, to, edge_type)
            .label(import.source.clone())
            .weight(import_weight(import))
            .source_file(source_path)
            .metadata_entry("import_kind", Value::String(import.kind.as_str().to_string()));
        if let Some(location) = import.location {
            draft = draft
                .metadata_entry("line", Value::from(location.line))
                .metadata_entry("column", Value::from(location.column));
        }
        if !import.symbols.is_empty() {
            let items: Vec<Value> = import
                .symbols
                .iter()
                .map(|s| Value::String(s.name.clone()))
                .collect();
            draft = draft.metadata_entry("symbols", Value::Array(items));
        }
        draft
    }

    fn store_error(&self, file: &str, source: StoreError) -> AnalyzerError {
        AnalyzerError::Store {
            file: file.to_string(),
            source,
        }
    }
}

/// Edge weight: `1 + 0.1·items + kind_bonus + default_bonus`, rounded
/// to one decimal. The constants match the observed ingestion behavior
/// and feed ranking downstream, nothing else.
fn import_weight(import: &ImportSource) -> f64 {
    let kind_bonus = match import.kind {
        ImportKind::Relative => 2.0,
        ImportKind::Absolute => 1.5,
        ImportKind::Library => 0.5,
        ImportKind::Builtin => 0.1,
    };
    let default_bonus = if import.symbols.iter().any(|s| s.is_default) {
        0.5
    } else {
        0.0
    };
    let weight = 1.0 + 0.1 * import.symbols.len() as f64 + kind_bonus + default_bonus;
    (weight * 10.0).round() / 10.0
}

fn push_unique(ids: &mut Vec<NodeId>, id: NodeId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}
