//! Project configuration.
//!
//! Read from `.callscope/config.toml` under the project directory when it
//! exists, then overridden from the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use callscope_core::AnalysisConfig;
use callscope_graph::GraphConfig;

pub const CONFIG_FILE: &str = ".callscope/config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallscopeConfig {
    pub analysis: AnalysisConfig,
    pub graph: GraphConfig,
}

impl CallscopeConfig {
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE)
    }

    /// Load the project configuration; a missing file means defaults.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::path(project_dir);
        let config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            debug!(path = %path.display(), "Loaded configuration");
            Self::from_toml(&raw)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            analysis: self.analysis.with_env_overrides(),
            graph: self.graph.with_env_overrides(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_tables_parse() {
        let config = CallscopeConfig::from_toml(
            r#"
            [analysis]
            max_depth = 8
            query_attempts = 2

            [graph]
            uri = "bolt://graph.internal:7687"
            "#,
        )
        .unwrap();

        assert_eq!(config.analysis.max_depth, 8);
        assert_eq!(config.analysis.query_attempts, 2);
        assert_eq!(config.analysis.run_deadline_secs, AnalysisConfig::default().run_deadline_secs);
        assert_eq!(config.graph.uri, "bolt://graph.internal:7687");
        assert_eq!(config.graph.user, "neo4j");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = std::env::temp_dir().join("callscope-config-test-missing");
        let config = CallscopeConfig::load(&dir).unwrap();
        assert_eq!(config.graph.database, "neo4j");
    }

    #[test]
    fn test_bad_toml_is_rejected() {
        assert!(CallscopeConfig::from_toml("[analysis\nmax_depth = 3").is_err());
    }
}
