//! Server configuration.

use std::path::{Path, PathBuf};

use remotefs_file_ops::Limits;
use serde::{Deserialize, Serialize};

use crate::ServerError;

/// Configuration of a [`FileServer`](crate::FileServer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Directory that `~` expands to.
    pub home_dir: PathBuf,
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: remotefs_file_ops::home_dir(),
            limits: Limits::default(),
        }
    }
}

impl ServerConfig {
    /// Config rooted at `home_dir` with default limits.
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            limits: Limits::default(),
        }
    }

    /// Parses a JSON config; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ServerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), home = %config.home_dir.display(), "loaded server config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            ServerConfig::from_json(r#"{"homeDir":"/srv/files","limits":{"maxDirSize":50}}"#)
                .unwrap();
        assert_eq!(config.home_dir, PathBuf::from("/srv/files"));
        assert_eq!(config.limits.max_dir_size, 50);
        assert_eq!(config.limits.dir_chunk_size, Limits::default().dir_chunk_size);
    }

    #[test]
    fn empty_json_is_default() {
        let config = ServerConfig::from_json("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(&path, r#"{"homeDir":"/data"}"#).unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.home_dir, PathBuf::from("/data"));
        assert_eq!(config.limits, Limits::default());
    }

    #[test]
    fn load_reports_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ServerConfig::load(&dir.path().join("missing.json")),
            Err(ServerError::Io(_))
        ));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ServerConfig::load(&path), Err(ServerError::Json(_))));
    }
}
