//! Init command - write a default shadowops.toml.

use crate::config::{self, API_KEY_ENV, CONFIG_FILE};
use anyhow::{Context, Result};
use colored::Colorize;
use shadowops_digest::DigestConfig;
use std::path::{Path, PathBuf};

pub fn run(path: Option<String>) -> Result<()> {
    let project_dir = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    println!("{} Initializing ShadowOps in {}", "→".blue(), project_dir.display());

    let config_path = write_default(&project_dir)?;
    match config_path {
        Some(path) => println!("  {} Created {}", "✓".green(), path.display()),
        None => println!("  {} {} already exists, leaving it unchanged", "•".yellow(), CONFIG_FILE),
    }

    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Set {} (or add api_key to {}) for remote embeddings", API_KEY_ENV, CONFIG_FILE);
    println!("  2. Run: shadowops digest tickets.txt --avg-minutes 30 --hourly-cost 40");
    println!();
    println!("Without an API key, digests use local TF-IDF clustering and template suggestions.");

    Ok(())
}

/// Write the default config into `dir`, returning its path, or `None` when
/// a config already exists there.
fn write_default(dir: &Path) -> Result<Option<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        return Ok(None);
    }
    config::save(&DigestConfig::default(), &config_path)?;
    Ok(Some(config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_default_creates_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_default(dir.path()).unwrap().unwrap();

        let loaded = config::read(&path).unwrap();
        assert_eq!(loaded, DigestConfig::default());
    }

    #[test]
    fn test_write_default_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[pipeline]\ntimeout_secs = 5\n").unwrap();

        assert!(write_default(dir.path()).unwrap().is_none());
        assert_eq!(config::read(&path).unwrap().pipeline.timeout_secs, 5);
    }
}
