use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use thesis_config::{PROJECT_DIR, ThesisConfig};
use thesis_db::service::ThesisService;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::InitArgs;
use crate::output::output;

#[derive(Debug, Serialize)]
struct InitReport {
    config_path: PathBuf,
    config_written: bool,
    database: String,
}

/// Handle `thesis init`.
pub async fn handle(
    args: &InitArgs,
    config: &ThesisConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let config_path = flags
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_DIR).join("config.toml"));
    let config_written = write_config(&config_path, config, args.force)?;

    // Opening runs the migrations.
    ThesisService::from_config(config)
        .await
        .with_context(|| format!("failed to create database at {}", config.database.path))?;
    tracing::info!(path = %config_path.display(), db = %config.database.path, "initialized");

    output(
        &InitReport {
            config_path,
            config_written,
            database: config.database.path.clone(),
        },
        flags.format,
    )
}

/// Write `config` unless a file exists and `force` is off.
fn write_config(path: &Path, config: &ThesisConfig, force: bool) -> anyhow::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let rendered = toml::to_string_pretty(config).context("failed to render config")?;
    std::fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn writes_once_unless_forced() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".thesis").join("config.toml");
        let mut config = ThesisConfig::default();

        assert!(write_config(&path, &config, false).unwrap());
        config.grading.pass_mark = 60.0;
        assert!(!write_config(&path, &config, false).unwrap());
        let loaded = ThesisConfig::load_from(&path).unwrap();
        assert_eq!(loaded.grading.pass_mark, 50.0);

        assert!(write_config(&path, &config, true).unwrap());
        let loaded = ThesisConfig::load_from(&path).unwrap();
        assert_eq!(loaded.grading.pass_mark, 60.0);
    }
}
