//! Edge-type taxonomy: the catalog of relationship types with
//! parent/transitive/inheritable flags, hierarchy traversal, and
//! validation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Names of the predefined edge types.
pub mod names {
    pub const CONTAINS: &str = "contains";
    pub const DECLARES: &str = "declares";
    pub const BELONGS_TO: &str = "belongs_to";
    pub const DEPENDS_ON: &str = "depends_on";
    pub const IMPORTS: &str = "imports";
    pub const IMPORTS_FILE: &str = "imports_file";
    pub const IMPORTS_LIBRARY: &str = "imports_library";
    pub const CALLS: &str = "calls";
    pub const REFERENCES: &str = "references";
    pub const EXTENDS: &str = "extends";
    pub const IMPLEMENTS: &str = "implements";
    pub const USES: &str = "uses";
    pub const INSTANTIATES: &str = "instantiates";
    pub const HAS_TYPE: &str = "has_type";
    pub const RETURNS: &str = "returns";
    pub const THROWS: &str = "throws";
    pub const ASSIGNS_TO: &str = "assigns_to";
    pub const ACCESSES: &str = "accesses";
    pub const OVERRIDES: &str = "overrides";
    pub const SHADOWS: &str = "shadows";
    pub const ANNOTATED_WITH: &str = "annotated_with";
}

/// An operation referenced a type missing from the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown edge type: {0}")]
pub struct UnknownEdgeType(pub String);

/// Structural problems in the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("edge type {child:?} names unknown parent {parent:?}")]
    UnknownParent { child: String, parent: String },
    #[error("cycle in edge-type hierarchy through {0:?}")]
    Cycle(String),
    #[error("duplicate edge-type name {0:?}")]
    DuplicateName(String),
    #[error("transitive type {name:?} contradicts inheritable ancestor {ancestor:?}")]
    ContradictoryFlags { name: String, ancestor: String },
    #[error("edge type {0:?} is already registered with a different definition")]
    ConflictingRedefinition(String),
}

/// Outcome of [`EdgeTypeRegistry::validate`].
#[derive(Debug, Clone, Default)]
pub struct HierarchyReport {
    pub valid: bool,
    pub errors: Vec<HierarchyError>,
}

/// One taxonomy entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTypeDef {
    pub name: String,
    pub description: String,
    /// JSON schema describing the metadata edges of this type carry.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub schema: serde_json::Value,
    pub is_directed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub is_transitive: bool,
    pub is_inheritable: bool,
    /// Higher beats lower when multiple rules produce the same derivation.
    pub priority: i32,
}

impl EdgeTypeDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::Value::Null,
            is_directed: true,
            parent: None,
            is_transitive: false,
            is_inheritable: false,
            priority: 0,
        }
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn transitive(mut self) -> Self {
        self.is_transitive = true;
        self
    }

    pub fn inheritable(mut self) -> Self {
        self.is_inheritable = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Authoritative catalog of edge types. Constructed once, read without
/// locks; dynamic registration goes through the explicit admin paths
/// ([`register`](Self::register), [`redefine`](Self::redefine)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTypeRegistry {
    types: BTreeMap<String, EdgeTypeDef>,
}

impl EdgeTypeRegistry {
    /// The predefined taxonomy every database starts from.
    pub fn predefined() -> Self {
        let defs = vec![
            EdgeTypeDef::new(names::CONTAINS, "structural containment (file contains class)")
                .transitive()
                .priority(10),
            EdgeTypeDef::new(names::DECLARES, "declaration containment (class declares method)")
                .child_of(names::CONTAINS)
                .transitive()
                .priority(8),
            EdgeTypeDef::new(names::BELONGS_TO, "reverse containment (method belongs to class)"),
            EdgeTypeDef::new(names::DEPENDS_ON, "general dependency")
                .transitive()
                .inheritable()
                .priority(10),
            EdgeTypeDef::new(names::IMPORTS, "module import dependency")
                .child_of(names::DEPENDS_ON)
                .priority(8),
            EdgeTypeDef::new(names::IMPORTS_FILE, "import of a project file")
                .child_of(names::IMPORTS)
                .priority(6),
            EdgeTypeDef::new(names::IMPORTS_LIBRARY, "import of an external package")
                .child_of(names::IMPORTS)
                .priority(6),
            EdgeTypeDef::new(names::CALLS, "function or method invocation"),
            EdgeTypeDef::new(names::REFERENCES, "symbol reference").inheritable(),
            EdgeTypeDef::new(names::EXTENDS, "class or interface inheritance").transitive(),
            EdgeTypeDef::new(names::IMPLEMENTS, "interface implementation"),
            EdgeTypeDef::new(names::USES, "general usage"),
            EdgeTypeDef::new(names::INSTANTIATES, "object construction"),
            EdgeTypeDef::new(names::HAS_TYPE, "declared type of a value"),
            EdgeTypeDef::new(names::RETURNS, "declared return type"),
            EdgeTypeDef::new(names::THROWS, "declared thrown type"),
            EdgeTypeDef::new(names::ASSIGNS_TO, "assignment target"),
            EdgeTypeDef::new(names::ACCESSES, "member access"),
            EdgeTypeDef::new(names::OVERRIDES, "method override"),
            EdgeTypeDef::new(names::SHADOWS, "name shadowing"),
            EdgeTypeDef::new(names::ANNOTATED_WITH, "decorator or annotation"),
        ];
        Self::from_defs(defs)
    }

    /// Build a registry from explicit definitions without validating.
    /// Call [`validate`](Self::validate) before trusting foreign data.
    pub fn from_defs(defs: Vec<EdgeTypeDef>) -> Self {
        let mut types = BTreeMap::new();
        for def in defs {
            types.insert(def.name.clone(), def);
        }
        Self { types }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&EdgeTypeDef> {
        self.types.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&EdgeTypeDef, UnknownEdgeType> {
        self.types
            .get(name)
            .ok_or_else(|| UnknownEdgeType(name.to_string()))
    }

    pub fn all(&self) -> impl Iterator<Item = &EdgeTypeDef> {
        self.types.values()
    }

    /// Direct children of a type, sorted by name.
    pub fn children_of(&self, name: &str) -> Vec<&str> {
        self.types
            .values()
            .filter(|d| d.parent.as_deref() == Some(name))
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Inclusive parent chain up to the root: `[name, parent, ...]`.
    /// Empty when the type is unknown; cycle-guarded.
    pub fn ancestors_of(&self, name: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.types.get(name);
        while let Some(def) = current {
            if !seen.insert(def.name.as_str()) {
                break;
            }
            chain.push(def.name.as_str());
            current = def.parent.as_deref().and_then(|p| self.types.get(p));
        }
        chain
    }

    /// Every type with a parent chain leading to `name`, excluding
    /// `name` itself. Sorted by name.
    pub fn descendants_of(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut frontier = vec![name.to_string()];
        let mut seen = HashSet::new();
        while let Some(current) = frontier.pop() {
            for child in self.children_of(&current) {
                if seen.insert(child.to_string()) {
                    out.push(child.to_string());
                    frontier.push(child.to_string());
                }
            }
        }
        out.sort();
        out
    }

    /// `[name]` plus its descendants: the set a hierarchical query over
    /// `name` follows.
    pub fn expand_with_descendants(&self, name: &str) -> Vec<String> {
        let mut out = vec![name.to_string()];
        out.extend(self.descendants_of(name));
        out
    }

    /// Whether `name` or any ancestor carries the transitive flag.
    pub fn is_transitive(&self, name: &str) -> bool {
        self.ancestors_of(name)
            .iter()
            .any(|a| self.types.get(*a).is_some_and(|d| d.is_transitive))
    }

    /// Whether `name` or any ancestor carries the inheritable flag.
    pub fn is_inheritable(&self, name: &str) -> bool {
        self.ancestors_of(name)
            .iter()
            .any(|a| self.types.get(*a).is_some_and(|d| d.is_inheritable))
    }

    /// Check the whole taxonomy: unknown parents, cycles, and
    /// transitive types under inheritable-only ancestors.
    pub fn validate(&self) -> HierarchyReport {
        let mut errors = Vec::new();
        for def in self.types.values() {
            if let Some(parent) = &def.parent {
                if !self.types.contains_key(parent) {
                    errors.push(HierarchyError::UnknownParent {
                        child: def.name.clone(),
                        parent: parent.clone(),
                    });
                }
                if self.parent_chain_cycles(&def.name) {
                    errors.push(HierarchyError::Cycle(def.name.clone()));
                }
            }
            if def.is_transitive {
                let contradiction = self
                    .ancestors_of(&def.name)
                    .into_iter()
                    .skip(1)
                    .find(|a| {
                        self.types
                            .get(*a)
                            .is_some_and(|d| d.is_inheritable && !d.is_transitive)
                    })
                    .map(str::to_string);
                if let Some(ancestor) = contradiction {
                    errors.push(HierarchyError::ContradictoryFlags {
                        name: def.name.clone(),
                        ancestor,
                    });
                }
            }
        }
        errors.dedup();
        HierarchyReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn parent_chain_cycles(&self, name: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(name);
        while let Some(n) = current {
            if !seen.insert(n) {
                return true;
            }
            current = self.types.get(n).and_then(|d| d.parent.as_deref());
        }
        false
    }

    /// The definitions that must be inserted into the store's edge-type
    /// table at initialization: the whole catalog.
    pub fn types_requiring_persistence(&self) -> Vec<&EdgeTypeDef> {
        self.types.values().collect()
    }

    /// Insert a new type. No-op (returns false) when an identical
    /// definition already exists; a conflicting duplicate is an error,
    /// existing definitions are never silently overwritten.
    pub fn register(&mut self, def: EdgeTypeDef) -> Result<bool, HierarchyError> {
        if let Some(existing) = self.types.get(&def.name) {
            if *existing == def {
                return Ok(false);
            }
            return Err(HierarchyError::ConflictingRedefinition(def.name));
        }
        if let Some(parent) = &def.parent
            && !self.types.contains_key(parent)
        {
            return Err(HierarchyError::UnknownParent {
                child: def.name.clone(),
                parent: parent.clone(),
            });
        }
        self.types.insert(def.name.clone(), def);
        Ok(true)
    }

    /// Replace (or insert) a definition, revalidating the whole
    /// hierarchy first. The caller is responsible for invalidating
    /// every cached inference (see
    /// [`crate::store::GraphStore::redefine_edge_type`]).
    pub fn redefine(&mut self, def: EdgeTypeDef) -> Result<(), HierarchyError> {
        let mut next = self.types.clone();
        next.insert(def.name.clone(), def);
        let candidate = Self { types: next };
        let report = candidate.validate();
        if let Some(err) = report.errors.into_iter().next() {
            return Err(err);
        }
        self.types = candidate.types;
        Ok(())
    }

    /// Remove a type; children keep existing with their parent cleared.
    pub fn remove(&mut self, name: &str) -> Option<EdgeTypeDef> {
        let removed = self.types.remove(name)?;
        for def in self.types.values_mut() {
            if def.parent.as_deref() == Some(name) {
                def.parent = None;
            }
        }
        Some(removed)
    }
}

impl Default for EdgeTypeRegistry {
    fn default() -> Self {
        Self::predefined()
    }
}
