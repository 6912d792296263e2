use crate::error::{DepInfoError, Result};
use crate::hasher::IgnoreRules;
use crate::source::ContentRoot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where packages and source files live, and how hard to work on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub content_roots: Vec<ContentRoot>,
    pub package_extensions: Vec<String>,
    pub shader_dir: Option<PathBuf>,
    pub shader_extensions: Vec<String>,
    pub script_source_dirs: Vec<PathBuf>,
    pub script_module_marker: String,
    pub script_directory_filters: Vec<String>,
    pub script_file_filters: Vec<String>,
    /// Glob patterns of relative paths that are never scanned.
    pub ignore: Vec<String>,
    pub worker_count: Option<usize>,
    pub resolve_timeout_secs: Option<u64>,
    pub pre_resolve_all: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            content_roots: Vec::new(),
            package_extensions: vec![".uasset".to_string(), ".umap".to_string()],
            shader_dir: None,
            shader_extensions: vec![".usf".to_string()],
            script_source_dirs: Vec::new(),
            script_module_marker: ".build.cs".to_string(),
            script_directory_filters: vec![
                "Classes/".to_string(),
                "Public/".to_string(),
                "Private/".to_string(),
            ],
            script_file_filters: vec![".h".to_string()],
            ignore: Vec::new(),
            worker_count: None,
            resolve_timeout_secs: None,
            pre_resolve_all: false,
        }
    }
}

impl TrackerConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DepInfoError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| DepInfoError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn ignore_rules(&self) -> IgnoreRules {
        IgnoreRules::from_patterns(&self.ignore)
    }

    pub fn workers(&self) -> usize {
        self.worker_count
            .filter(|n| *n > 0)
            .unwrap_or_else(rayon::current_num_threads)
    }

    pub fn resolve_timeout(&self) -> Option<Duration> {
        self.resolve_timeout_secs.map(Duration::from_secs)
    }

    pub fn is_package_file(&self, relative: &str) -> bool {
        self.package_extensions
            .iter()
            .any(|ext| relative.ends_with(ext.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkgdeps.json");
        std::fs::write(
            &path,
            r#"{ "content_roots": [{ "mount": "/Game", "path": "Content" }], "worker_count": 3 }"#,
        )
        .unwrap();

        let config = TrackerConfig::load(&path).unwrap();
        assert_eq!(config.content_roots.len(), 1);
        assert_eq!(config.workers(), 3);
        assert_eq!(config.shader_extensions, vec![".usf".to_string()]);
        assert!(config.is_package_file("Maps/Arena.umap"));
        assert!(!config.is_package_file("Maps/Arena.txt"));
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();

        let err = TrackerConfig::load(&path).unwrap_err();
        assert!(matches!(err, DepInfoError::Config { .. }));
        assert!(err.to_string().contains("broken.json"));
        assert!(TrackerConfig::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_zero_workers_falls_back() {
        let config = TrackerConfig {
            worker_count: Some(0),
            ..Default::default()
        };
        assert!(config.workers() >= 1);
        assert!(config.resolve_timeout().is_none());
    }
}
