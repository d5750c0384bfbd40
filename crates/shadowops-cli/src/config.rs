//! Configuration discovery for the ShadowOps CLI.

use anyhow::{bail, Context, Result};
use shadowops_digest::DigestConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name searched for.
pub const CONFIG_FILE: &str = "shadowops.toml";

/// Environment variable consulted when the config has no API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Load config from `explicit`, else the nearest shadowops.toml, else the
/// user config directory, else defaults. Fills a missing API key from the
/// environment.
pub fn load(explicit: Option<&Path>) -> Result<DigestConfig> {
    let path = match explicit {
        Some(path) if !path.exists() => bail!("Config file not found: {}", path.display()),
        Some(path) => Some(path.to_path_buf()),
        None => std::env::current_dir()
            .ok()
            .and_then(|dir| find_config_file(&dir))
            .or_else(global_config_file),
    };

    let config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            read(&path)?
        }
        None => DigestConfig::default(),
    };

    Ok(config.with_fallback_api_key(std::env::var(API_KEY_ENV).ok()))
}

/// Parse a config file.
pub fn read(path: &Path) -> Result<DigestConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Save config to the specified path.
pub fn save(config: &DigestConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(())
}

/// Find shadowops.toml in `start` or its parent directories.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.is_file() {
            return Some(config_path);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// `<config dir>/shadowops/shadowops.toml`, if present.
fn global_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("shadowops").join(CONFIG_FILE);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_config_in_parent() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join(CONFIG_FILE), "").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, root.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_save_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = DigestConfig::default();
        config.clustering.similarity_threshold = 0.72;
        config.pipeline.timeout_secs = 12;
        save(&config, &path).unwrap();

        let loaded = read(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[clustering]\nmax_clusters = 4\n").unwrap();

        let config = read(&path).unwrap();
        assert_eq!(config.clustering.max_clusters, 4);
        assert_eq!(config.clustering.seed, 42);
        assert_eq!(config.generation.max_tokens, 100);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[clustering\n").unwrap();
        assert!(read(&path).is_err());
    }
}
