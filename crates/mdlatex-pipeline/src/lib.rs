// SPDX-License-Identifier: AGPL-3.0-or-later
//! mdlatex pipeline - file staging around the core converter
//!
//! Sources are staged into an upload directory under unique, sanitized
//! names, converted on blocking worker threads, and written to an output
//! directory. Both directories are swept by age.

pub mod config;
pub mod staging;

pub use config::{ConfigError, StagingConfig};
pub use staging::{generate_unique_filename, is_valid_extension, sanitize_filename};

use mdlatex_core::{ConversionError, Converter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{error, info, warn};

/// Base name for converted content that arrives without one
pub const DEFAULT_BASE_NAME: &str = "converted";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported file type: {name}")]
    InvalidExtension { name: String },

    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("No content provided")]
    MissingContent,

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// A document written to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub output_filename: String,
    pub output_path: PathBuf,
    pub size: u64,
}

/// Staging and conversion service; cheap to clone
#[derive(Clone)]
pub struct ConversionService {
    config: Arc<StagingConfig>,
    converter: Arc<Converter>,
}

impl ConversionService {
    pub fn new(config: StagingConfig) -> Self {
        let converter = Converter::new(&config.convert);
        Self {
            config: Arc::new(config),
            converter: Arc::new(converter),
        }
    }

    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    pub async fn ensure_directories(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        Ok(())
    }

    /// Validate and store an upload; returns the staged file name
    pub async fn stage_upload(&self, original_name: &str, bytes: &[u8]) -> Result<String> {
        self.validate(original_name, bytes.len() as u64)?;

        let staged_name = generate_unique_filename(original_name);
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        tokio::fs::write(self.config.upload_dir.join(&staged_name), bytes).await?;

        info!(original = original_name, staged = %staged_name, bytes = bytes.len(), "staged upload");
        Ok(staged_name)
    }

    /// Convert a file previously returned by `stage_upload`
    pub async fn convert_file(&self, staged_name: &str) -> Result<ConvertedFile> {
        if staged_name.is_empty() || sanitize_filename(staged_name) != staged_name {
            return Err(PipelineError::NotFound(staged_name.to_string()));
        }
        self.convert_path(&self.config.upload_dir.join(staged_name)).await
    }

    /// Convert any source file on disk into the output directory
    pub async fn convert_path(&self, path: &Path) -> Result<ConvertedFile> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        if !is_valid_extension(&name, &self.config.allowed_extensions) {
            return Err(PipelineError::InvalidExtension { name });
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::NotFound(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        self.validate(&name, bytes.len() as u64)?;

        let converter = Arc::clone(&self.converter);
        let document = tokio::task::spawn_blocking(move || converter.convert_bytes(&bytes))
            .await
            .map_err(|err| PipelineError::Join(err.to_string()))??;

        self.write_output(&name, document).await
    }

    /// Convert content posted directly, without staging it first
    pub async fn convert_content(
        &self,
        content: &str,
        filename: Option<&str>,
    ) -> Result<ConvertedFile> {
        if content.trim().is_empty() {
            return Err(PipelineError::MissingContent);
        }
        let name = filename
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_NAME)
            .to_string();

        let converter = Arc::clone(&self.converter);
        let content = content.to_string();
        let document = tokio::task::spawn_blocking(move || converter.convert(&content))
            .await
            .map_err(|err| PipelineError::Join(err.to_string()))??;

        self.write_output(&name, document).await
    }

    /// Convert several files concurrently; results keep the input order
    pub async fn convert_batch(&self, paths: Vec<PathBuf>) -> Vec<Result<ConvertedFile>> {
        let handles: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let service = self.clone();
                tokio::spawn(async move { service.convert_path(&path).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle
                .await
                .map_err(|err| PipelineError::Join(err.to_string()))
                .and_then(|result| result);
            if let Err(err) = &result {
                warn!(error = %err, "batch item failed");
            }
            results.push(result);
        }
        results
    }

    /// Delete staged and converted files older than the configured age;
    /// returns how many were removed
    pub async fn cleanup_old_files(&self) -> Result<usize> {
        let max_age = self.config.file_max_age();
        let mut removed = 0;

        for dir in [&self.config.upload_dir, &self.config.output_dir] {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                if !metadata.is_file() {
                    continue;
                }
                let age = SystemTime::now()
                    .duration_since(metadata.modified()?)
                    .unwrap_or_default();
                if age <= max_age {
                    continue;
                }
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => {
                        info!(path = %entry.path().display(), "deleted old file");
                        removed += 1;
                    }
                    Err(err) => {
                        error!(path = %entry.path().display(), error = %err, "failed to delete old file")
                    }
                }
            }
        }

        Ok(removed)
    }

    fn validate(&self, name: &str, size: u64) -> Result<()> {
        if !is_valid_extension(name, &self.config.allowed_extensions) {
            return Err(PipelineError::InvalidExtension {
                name: name.to_string(),
            });
        }
        if size > self.config.max_file_size {
            return Err(PipelineError::FileTooLarge {
                size,
                limit: self.config.max_file_size,
            });
        }
        Ok(())
    }

    async fn write_output(&self, source_name: &str, document: Vec<u8>) -> Result<ConvertedFile> {
        let output_filename = generate_unique_filename(&staging::docx_name(source_name));
        let output_path = self.config.output_dir.join(&output_filename);

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tokio::fs::write(&output_path, &document).await?;

        info!(source = source_name, output = %output_filename, bytes = document.len(), "wrote document");
        Ok(ConvertedFile {
            output_filename,
            output_path,
            size: document.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ConversionService {
        ConversionService::new(StagingConfig {
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
            max_file_size: 1024,
            ..StagingConfig::default()
        })
    }

    #[tokio::test]
    async fn test_stage_and_convert() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.ensure_directories().await.unwrap();

        let staged = service
            .stage_upload("my notes.md", b"# Title\n\n$$x^2$$")
            .await
            .unwrap();
        assert!(staged.starts_with("my_notes_"));
        assert!(dir.path().join("uploads").join(&staged).exists());

        let converted = service.convert_file(&staged).await.unwrap();
        assert!(converted.output_filename.ends_with(".docx"));
        assert!(converted.output_path.starts_with(dir.path().join("outputs")));
        let bytes = std::fs::read(&converted.output_path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(converted.size, bytes.len() as u64);
    }

    #[tokio::test]
    async fn test_stage_rejects_bad_uploads() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        assert!(matches!(
            service.stage_upload("image.png", b"x").await,
            Err(PipelineError::InvalidExtension { .. })
        ));
        assert!(matches!(
            service.stage_upload("big.md", &[b'a'; 2048]).await,
            Err(PipelineError::FileTooLarge { size: 2048, limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_convert_file_missing_or_unsafe() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        assert!(matches!(
            service.convert_file("absent.md").await,
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            service.convert_file("../secret.md").await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_convert_content() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        assert!(matches!(
            service.convert_content("  \n", None).await,
            Err(PipelineError::MissingContent)
        ));

        let converted = service.convert_content("Hello", None).await.unwrap();
        assert!(converted.output_filename.starts_with("converted_"));

        let named = service
            .convert_content("Hello", Some("report.md"))
            .await
            .unwrap();
        assert!(named.output_filename.starts_with("report_"));
        assert!(named.output_filename.ends_with(".docx"));
    }

    #[tokio::test]
    async fn test_convert_batch_keeps_order() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let first = dir.path().join("first.md");
        let third = dir.path().join("third.markdown");
        std::fs::write(&first, "# One").unwrap();
        std::fs::write(&third, "- three").unwrap();

        let results = service
            .convert_batch(vec![first, dir.path().join("missing.md"), third])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().output_filename.starts_with("first_"));
        assert!(matches!(results[1], Err(PipelineError::NotFound(_))));
        assert!(results[2].as_ref().unwrap().output_filename.starts_with("third_"));
    }

    #[tokio::test]
    async fn test_convert_path_rejects_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let path = dir.path().join("bad.md");
        std::fs::write(&path, [0xff, 0xfe]).unwrap();

        assert!(matches!(
            service.convert_path(&path).await,
            Err(PipelineError::Conversion(ConversionError::Tokenize { .. }))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_old_files() {
        let dir = TempDir::new().unwrap();
        let fresh = service(&dir);
        fresh.ensure_directories().await.unwrap();
        fresh.stage_upload("a.md", b"a").await.unwrap();
        fresh.convert_content("b", None).await.unwrap();

        assert_eq!(fresh.cleanup_old_files().await.unwrap(), 0);

        let expiring = ConversionService::new(StagingConfig {
            file_max_age_secs: 0,
            ..fresh.config().clone()
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(expiring.cleanup_old_files().await.unwrap(), 2);
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_without_directories() {
        let dir = TempDir::new().unwrap();
        assert_eq!(service(&dir).cleanup_old_files().await.unwrap(), 0);
    }
}
