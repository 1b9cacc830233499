//! Read-only dependency trees over the import edge family.

use deplink_core::edge_types::names;
use deplink_core::graph::{NodeId, kinds};
use deplink_core::store::GraphStore;
use serde::Serialize;
use std::collections::HashSet;

/// The requested root is not in the graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no node with identifier {0:?}")]
pub struct UnknownRoot(pub String);

/// One node in a dependency tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub node: NodeId,
    pub identifier: String,
    pub name: String,
    pub kind: String,
    pub is_library: bool,
    /// Set when the node already appears on the path from the root;
    /// the traversal stops here instead of recursing.
    pub is_circular: bool,
    pub children: Vec<TreeNode>,
}

/// A bounded dependency tree rooted at one file node.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyTree {
    pub root: TreeNode,
    /// True when `max_depth` cut the traversal short.
    pub truncated: bool,
}

/// Walk `imports_file` and `imports_library` edges from the node with
/// the given identifier. Libraries are leaves; cycles are flagged, not
/// followed.
pub fn dependency_tree(
    store: &GraphStore,
    root_identifier: &str,
    max_depth: u32,
) -> Result<DependencyTree, UnknownRoot> {
    let Some(node) = store.node_by_identifier(root_identifier) else {
        return Err(UnknownRoot(root_identifier.to_string()));
    };
    let mut truncated = false;
    let mut on_path = HashSet::new();
    let root = build(store, node.id, 0, max_depth, &mut on_path, &mut truncated);
    Ok(DependencyTree { root, truncated })
}

fn build(
    store: &GraphStore,
    id: NodeId,
    depth: u32,
    max_depth: u32,
    on_path: &mut HashSet<NodeId>,
    truncated: &mut bool,
) -> TreeNode {
    let (identifier, name, kind) = match store.node(id) {
        Some(node) => (node.identifier.clone(), node.name.clone(), node.kind.clone()),
        None => (String::new(), String::new(), String::new()),
    };
    let is_library = kind == kinds::LIBRARY;
    let mut tree_node = TreeNode {
        node: id,
        identifier,
        name,
        kind,
        is_library,
        is_circular: false,
        children: Vec::new(),
    };
    if is_library {
        return tree_node;
    }
    if on_path.contains(&id) {
        tree_node.is_circular = true;
        return tree_node;
    }

    let child_ids: Vec<NodeId> = store
        .outgoing_edges(id)
        .into_iter()
        .filter(|e| e.edge_type == names::IMPORTS_FILE || e.edge_type == names::IMPORTS_LIBRARY)
        .map(|e| e.to)
        .collect();
    if child_ids.is_empty() {
        return tree_node;
    }
    if depth >= max_depth {
        *truncated = true;
        return tree_node;
    }

    on_path.insert(id);
    for child in child_ids {
        tree_node
            .children
            .push(build(store, child, depth + 1, max_depth, on_path, truncated));
    }
    on_path.remove(&id);
    tree_node
}
