///! CLI configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokenctl_common::{Cluster, ClusterSet};

use crate::federation::DEFAULT_MAX_CONCURRENCY;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_output")]
    pub default_output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Cap on concurrent requests per fan-out
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_output() -> String {
    "table".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            http: HttpConfig::default(),
            default_output: default_output(),
        }
    }
}

impl Config {
    /// Load from `explicit`, or from the default location when it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let config_path = Self::config_path()?;
                if !config_path.exists() {
                    return Ok(Self::default());
                }
                Self::load_from(&config_path)
            }
        }
    }

    /// Parse a config file, picking the format from its extension
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        let config: Config = match extension.as_deref() {
            Some("json") => serde_json::from_str(&contents)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            _ => toml::from_str(&contents)?,
        };

        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config/tokenctl/config.toml"))
    }

    pub fn cluster_set(&self) -> tokenctl_common::Result<ClusterSet> {
        ClusterSet::new(self.clusters.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml() {
        let file = write_config(
            ".toml",
            r#"
default-output = "json"

[http]
timeout-secs = 5

[[clusters]]
name = "waiter1"
url = "http://localhost:9091"
sync-group = "g"
default-for-create = true

[[clusters]]
name = "waiter2"
address = "http://localhost:9191"
sync-group = "g"
"#,
        );

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.default_output, "json");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.http.max_concurrency, DEFAULT_MAX_CONCURRENCY);

        let clusters = config.cluster_set().unwrap();
        assert_eq!(clusters.names(), vec!["waiter1", "waiter2"]);
        assert_eq!(clusters.get("waiter2").unwrap().url, "http://localhost:9191");
        assert_eq!(clusters.default_for_create().unwrap().name, "waiter1");
    }

    #[test]
    fn test_load_json_and_yaml() {
        let json = write_config(
            ".json",
            r#"{"clusters": [{"name": "a", "url": "http://a", "sync-group": "prod"}]}"#,
        );
        let yaml = write_config(
            ".yaml",
            "clusters:\n  - name: a\n    url: http://a\n    sync-group: prod\n",
        );

        for file in [json, yaml] {
            let config = Config::load_from(file.path()).unwrap();
            assert_eq!(config.default_output, "table");
            assert_eq!(config.clusters[0].sync_group.as_deref(), Some("prod"));
        }
    }

    #[test]
    fn test_duplicate_cluster_names_rejected() {
        let file = write_config(
            ".toml",
            r#"
[[clusters]]
name = "a"
url = "http://a"

[[clusters]]
name = "a"
url = "http://other"
"#,
        );

        let config = Config::load_from(file.path()).unwrap();
        assert!(matches!(
            config.cluster_set(),
            Err(tokenctl_common::Error::DuplicateCluster(name)) if name == "a"
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
