//! User configuration handling.
//!
//! Configuration lives in `<config dir>/comment-pool/config.toml`:
//!
//! ```toml
//! [limits]
//! top_level_batch = 20
//! children_on_expand = 3
//! ```

use crate::pool::PoolLimits;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: PoolLimits,
}

/// Load configuration from `path`, or from the user's config directory.
///
/// A missing file yields defaults. A file that exists but cannot be read or
/// parsed is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match config_path() {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };
    if !path.exists() {
        return Ok(Config::default());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Failed to parse config: {}", path.display()))
}

pub fn parse_config(text: &str) -> Result<Config> {
    Ok(toml::from_str(text)?)
}

fn config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("comment-pool").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::limits::{DEFAULT_BULK_LOAD_LIMIT, DEFAULT_CHILDREN_BATCH};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_uses_defaults() {
        assert_eq!(parse_config("").unwrap(), Config::default());
    }

    #[test]
    fn partial_limits_keep_other_defaults() {
        let config = parse_config("[limits]\ntop_level_batch = 20\nchildren_on_expand = 3\n").unwrap();
        assert_eq!(config.limits.top_level_batch, 20);
        assert_eq!(config.limits.children_on_expand, 3);
        assert_eq!(config.limits.bulk_load_limit, DEFAULT_BULK_LOAD_LIMIT);
        assert_eq!(config.limits.children_batch, DEFAULT_CHILDREN_BATCH);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_config("[limits]\ntop_level_batch = \"many\"\n").is_err());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[limits]\nbulk_load_limit = 100\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().limits.bulk_load_limit, 100);
    }
}
