//! Versioned envelope for the embedded database file.

use crate::store::{GraphStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: &str = "1.0.0";

/// Project framing persisted alongside the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub root: String,
}

/// The on-disk shape of a deplink database.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphFile {
    pub version: String,
    pub project: ProjectInfo,
    pub saved_at: DateTime<Utc>,
    pub store: GraphStore,
}

#[derive(Serialize)]
struct GraphFileRef<'a> {
    version: &'a str,
    project: &'a ProjectInfo,
    saved_at: DateTime<Utc>,
    store: &'a GraphStore,
}

/// Serialize a store to the versioned JSON envelope.
pub fn to_json(store: &GraphStore, project: &ProjectInfo) -> Result<String, StoreError> {
    let file = GraphFileRef {
        version: CURRENT_VERSION,
        project,
        saved_at: Utc::now(),
        store,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Deserialize and version-check a database envelope.
pub fn from_json(json: &str) -> Result<GraphFile, StoreError> {
    let file: GraphFile = serde_json::from_str(json)?;
    if file.version != CURRENT_VERSION {
        return Err(StoreError::Version {
            expected: CURRENT_VERSION.to_string(),
            found: file.version,
        });
    }
    Ok(file)
}
