//! File-dependency ingestion for the deplink graph: map
//! parser-extracted imports to nodes and typed edges with idempotent
//! re-analysis, plus read-only dependency trees.

pub mod analyzer;
pub mod import_source;
pub mod language;
pub mod resolve;
pub mod tree;
