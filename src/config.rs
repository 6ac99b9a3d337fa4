//! Build configuration, read from an optional `jml.json` at the project root.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cache::ChangeDetection;

pub const CONFIG_FILE: &str = "jml.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Paths other than `root` are relative to `root` unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    #[serde(skip)]
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
    pub cache_file: PathBuf,
    pub parallel: bool,
    pub change_detection: ChangeDetection,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            source_dir: PathBuf::from("src"),
            out_dir: PathBuf::from("dist"),
            cache_file: PathBuf::from(".jml/cache.json"),
            parallel: false,
            change_detection: ChangeDetection::default(),
        }
    }
}

impl BuildConfig {
    /// Defaults rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Reads `root/jml.json` if it exists; otherwise returns defaults.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let path = root.join(CONFIG_FILE);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(root = %root.display(), "no jml.json, using defaults");
                return Ok(Self::new(root));
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let mut config: BuildConfig =
            serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.root = root;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    fn under_root(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.under_root(&self.source_dir)
    }

    pub fn out_path(&self) -> PathBuf {
        self.under_root(&self.out_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.under_root(&self.cache_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::load(dir.path()).unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.source_path(), dir.path().join("src"));
        assert_eq!(config.out_path(), dir.path().join("dist"));
        assert_eq!(config.cache_path(), dir.path().join(".jml/cache.json"));
        assert!(!config.parallel);
        assert_eq!(config.change_detection, ChangeDetection::MtimeThenHash);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "outDir": "/tmp/site", "parallel": true, "changeDetection": "always_hash" }"#,
        )
        .unwrap();

        let config = BuildConfig::load(dir.path()).unwrap();
        assert_eq!(config.out_path(), PathBuf::from("/tmp/site"));
        assert_eq!(config.source_dir, PathBuf::from("src"));
        assert!(config.parallel);
        assert_eq!(config.change_detection, ChangeDetection::AlwaysHash);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{ "parallel": "yes" }"#).unwrap();
        assert!(matches!(
            BuildConfig::load(dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
