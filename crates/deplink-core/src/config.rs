//! Configuration: project framing, storage, traversal limits, and the
//! analyzer's owned edge types.
//!
//! Load order: `.deplink/config.toml` → environment variables → defaults.

use crate::edge_types::names;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level deplink configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeplinkConfig {
    pub project: ProjectConfig,
    pub storage: StorageConfig,
    pub traversal: TraversalConfig,
    pub analyzer: AnalyzerConfig,
}

/// Project framing recorded in the database envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Compress graph.json with zstd before writing.
    /// Decompression on load is automatic (detected by magic bytes).
    pub compress: bool,
}

/// Bounds for transitive/inheritable traversals and dependency trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Maximum derivation depth.
    pub max_depth: u32,
    /// Wall-clock cap in milliseconds; exceeding it truncates the
    /// result instead of failing.
    pub time_budget_ms: Option<u64>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            time_budget_ms: None,
        }
    }
}

/// Analyzer ownership contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Edge types the file-dependency analyzer owns and may delete
    /// during scoped cleanup. Changing this set is a versioned
    /// migration, not a tuning knob.
    pub owned_edge_types: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            owned_edge_types: vec![
                names::IMPORTS_FILE.to_string(),
                names::IMPORTS_LIBRARY.to_string(),
            ],
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl DeplinkConfig {
    /// Load config from `.deplink/config.toml` in the project root,
    /// with env var overrides. Falls back to defaults if no config
    /// file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".deplink").join("config.toml");

        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override("DEPLINK_PROJECT_NAME", &mut config.project.name);
        env_override("DEPLINK_COMPRESS", &mut config.storage.compress);
        env_override("DEPLINK_MAX_DEPTH", &mut config.traversal.max_depth);
        if let Ok(v) = std::env::var("DEPLINK_TIME_BUDGET_MS")
            && let Ok(n) = v.parse()
        {
            config.traversal.time_budget_ms = Some(n);
        }

        if config.traversal.max_depth == 0 {
            anyhow::bail!("traversal.max_depth must be at least 1");
        }
        if config.analyzer.owned_edge_types.is_empty() {
            anyhow::bail!("analyzer.owned_edge_types must not be empty");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeplinkConfig::default();
        assert_eq!(config.traversal.max_depth, 10);
        assert_eq!(config.traversal.time_budget_ms, None);
        assert!(!config.storage.compress);
        assert_eq!(
            config.analyzer.owned_edge_types,
            vec!["imports_file".to_string(), "imports_library".to_string()]
        );
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[project]
name = "webapp"

[storage]
compress = true

[traversal]
max_depth = 6
"#;
        let config: DeplinkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project.name, "webapp");
        assert!(config.storage.compress);
        assert_eq!(config.traversal.max_depth, 6);
        // Defaults for unspecified fields
        assert_eq!(config.analyzer.owned_edge_types.len(), 2);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let config = DeplinkConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.traversal.max_depth, 10);
    }

    #[test]
    fn test_load_rejects_zero_depth() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".deplink");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[traversal]\nmax_depth = 0\n").unwrap();
        assert!(DeplinkConfig::load(tmp.path()).is_err());
    }

    #[test]
    fn test_load_rejects_empty_owned_set() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".deplink");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[analyzer]\nowned_edge_types = []\n").unwrap();
        assert!(DeplinkConfig::load(tmp.path()).is_err());
    }
}
