// SPDX-License-Identifier: AGPL-3.0-or-later
//! Staging configuration loaded from TOML

use mdlatex_core::ConvertConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_FILE_MAX_AGE_SECS: u64 = 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Where uploaded sources are staged
    pub upload_dir: PathBuf,
    /// Where converted documents are written
    pub output_dir: PathBuf,
    /// Largest accepted source, in bytes
    pub max_file_size: u64,
    /// Accepted source suffixes, compared case-insensitively
    pub allowed_extensions: Vec<String>,
    /// Staged and converted files older than this are removed by cleanup
    pub file_max_age_secs: u64,
    pub convert: ConvertConfig,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: vec![".md".into(), ".markdown".into(), ".tex".into()],
            file_max_age_secs: DEFAULT_FILE_MAX_AGE_SECS,
            convert: ConvertConfig::default(),
        }
    }
}

impl StagingConfig {
    /// Load from a TOML file; `Ok(None)` when the file does not exist
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(config))
    }

    pub fn file_max_age(&self) -> Duration {
        Duration::from_secs(self.file_max_age_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdlatex_core::NumberingPolicy;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nonexistent.toml");

        assert!(StagingConfig::load_from_path(&missing).unwrap().is_none());
    }

    #[test]
    fn test_load_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mdlatex.toml");
        std::fs::write(
            &path,
            r#"
upload_dir = "/srv/in"
max_file_size = 1024

[convert]
numbering = "continue"

[convert.tokenizer]
html = false
"#,
        )
        .unwrap();

        let config = StagingConfig::load_from_path(&path).unwrap().unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(config.convert.transducer.numbering, NumberingPolicy::Continue);
        assert!(!config.convert.tokenizer.html);
        assert!(config.convert.tokenizer.math_dollars);
        assert_eq!(config.file_max_age(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "max_file_size = \"lots\"").unwrap();

        let err = StagingConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_defaults() {
        let config = StagingConfig::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.allowed_extensions, vec![".md", ".markdown", ".tex"]);
    }
}
