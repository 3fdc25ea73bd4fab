// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subcommand implementations

use anyhow::{bail, Context, Result};
use mdlatex_core::Converter;
use mdlatex_pipeline::{ConversionService, StagingConfig};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Configuration read when no `--config` is given and the file exists
pub const DEFAULT_CONFIG_FILE: &str = "mdlatex.toml";

/// Explicit config must exist; the default one is optional
pub fn load_config(path: Option<&Path>) -> Result<StagingConfig> {
    match path {
        Some(path) => StagingConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?
            .with_context(|| format!("config file {} not found", path.display())),
        None => Ok(StagingConfig::load_from_path(DEFAULT_CONFIG_FILE)
            .context("loading default config")?
            .unwrap_or_default()),
    }
}

pub async fn convert(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    config: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(output) = output {
        config.output_dir = output;
    }

    let service = ConversionService::new(config);
    let total = inputs.len();
    let results = service.convert_batch(inputs.clone()).await;
    let mut failed = 0;
    for (input, result) in inputs.iter().zip(results) {
        match result {
            Ok(converted) => println!("{}", converted.output_path.display()),
            Err(err) => {
                error!(input = %input.display(), error = %err, "conversion failed");
                failed += 1;
            }
        }
    }

    info!(total, failed, "batch finished");
    if failed > 0 {
        bail!("{failed} of {total} conversions failed");
    }
    Ok(())
}

pub fn dump(input: &Path, tokens: bool, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let converter = Converter::new(&config.convert);

    let json = if tokens {
        serde_json::to_string_pretty(&converter.tokenize(&source)?)?
    } else {
        serde_json::to_string_pretty(&converter.to_document(&source)?)?
    };
    println!("{json}");
    Ok(())
}

pub async fn clean(config: Option<&Path>) -> Result<()> {
    let service = ConversionService::new(load_config(config)?);
    let removed = service.cleanup_old_files().await?;
    println!("removed {removed} file(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_explicit_config_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mdlatex.toml");
        std::fs::write(&path, "output_dir = \"out\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[tokio::test]
    async fn test_convert_writes_into_output_dir() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "# Hi\n\n$a+b$").unwrap();
        let out = dir.path().join("out");

        convert(vec![input], Some(out.clone()), None).await.unwrap();
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_convert_reports_failures() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let result = convert(vec![dir.path().join("nope.md")], Some(out), None).await;
        assert!(result.is_err());
    }
}
