//! Graph data model: nodes, edges, upsert drafts, and lookup filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store-assigned node id, stable within a database.
pub type NodeId = i64;
/// Store-assigned edge id, stable within a database.
pub type EdgeId = i64;

/// Well-known node kinds. The set is open (the store accepts any kind
/// string); these are the ones the engine itself produces or queries.
pub mod kinds {
    pub const FILE: &str = "file";
    pub const CLASS: &str = "class";
    pub const METHOD: &str = "method";
    pub const FUNCTION: &str = "function";
    pub const VARIABLE: &str = "variable";
    pub const INTERFACE: &str = "interface";
    pub const TYPE: &str = "type";
    pub const EXPORT: &str = "export";
    pub const IMPORT: &str = "import";
    pub const LIBRARY: &str = "library";
}

/// Source range for a node, when the parser reported one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// An identified entity in the codebase: a file, a symbol inside a
/// file, or an external library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Globally unique, human-parseable identifier (see [`crate::identity`]).
    pub identifier: String,
    pub kind: String,
    pub name: String,
    /// Empty only when `kind == "library"`.
    pub source_file: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semantic_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input accepted by [`crate::store::GraphStore::upsert_node`]; the
/// store assigns the id and timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDraft {
    pub identifier: String,
    pub kind: String,
    pub name: String,
    pub source_file: String,
    pub language: String,
    pub semantic_tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub span: Option<Span>,
}

impl NodeDraft {
    pub fn new(
        identifier: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind: kind.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = source_file.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn metadata_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A typed directed relationship between two nodes.
/// `(from, to, type)` is unique: at most one edge per triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub weight: f64,
    /// The file whose analysis produced this edge; drives scoped
    /// cleanup. None for edges nobody owns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input accepted by [`crate::store::GraphStore::upsert_edge`].
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDraft {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: String,
    pub label: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub weight: f64,
    pub source_file: Option<String>,
}

impl EdgeDraft {
    pub fn new(from: NodeId, to: NodeId, edge_type: impl Into<String>) -> Self {
        Self {
            from,
            to,
            edge_type: edge_type.into(),
            label: String::new(),
            metadata: BTreeMap::new(),
            weight: 1.0,
            source_file: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn metadata_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Node lookup constraints. Empty vectors mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub kinds: Vec<String>,
    pub languages: Vec<String>,
    pub source_files: Vec<String>,
    pub names: Vec<String>,
    pub identifier_contains: Option<String>,
}

impl NodeFilter {
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kinds: vec![kind.into()],
            ..Self::default()
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        (self.kinds.is_empty() || self.kinds.iter().any(|k| *k == node.kind))
            && (self.languages.is_empty() || self.languages.iter().any(|l| *l == node.language))
            && (self.source_files.is_empty()
                || self.source_files.iter().any(|f| *f == node.source_file))
            && (self.names.is_empty() || self.names.iter().any(|n| *n == node.name))
            && self
                .identifier_contains
                .as_ref()
                .is_none_or(|needle| node.identifier.contains(needle.as_str()))
    }
}

/// Edge lookup constraints. Empty/None means "no constraint".
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub types: Vec<String>,
    pub from: Option<NodeId>,
    pub to: Option<NodeId>,
    pub source_files: Vec<String>,
}

impl EdgeFilter {
    pub fn of_types(types: Vec<String>) -> Self {
        Self {
            types,
            ..Self::default()
        }
    }

    pub fn matches(&self, edge: &Edge) -> bool {
        (self.types.is_empty() || self.types.iter().any(|t| *t == edge.edge_type))
            && self.from.is_none_or(|id| id == edge.from)
            && self.to.is_none_or(|id| id == edge.to)
            && (self.source_files.is_empty()
                || edge
                    .source_file
                    .as_ref()
                    .is_some_and(|f| self.source_files.iter().any(|s| s == f)))
    }
}

/// One analyzer run over one file, kept as an append-only log so the
/// database records how it was populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub source_file: String,
    pub language: String,
    pub nodes_upserted: usize,
    pub edges_created: usize,
    pub missing_links: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
