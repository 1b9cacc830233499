//! Embedded property-graph engine for code dependency analysis.
//!
//! Provides stable node identifiers ([`identity`]), the edge-type
//! taxonomy ([`edge_types::EdgeTypeRegistry`]), the persistent
//! node/edge store ([`store::GraphStore`]), derived-relationship
//! queries ([`inference::InferenceEngine`]), and single-file
//! persistence ([`storage`]).

pub mod cache;
pub mod config;
pub mod edge_types;
pub mod graph;
pub mod identity;
pub mod inference;
pub mod schema;
pub mod storage;
pub mod store;
