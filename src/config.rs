//! Process configuration
//!
//! Settings come from environment variables. Only the catalog credentials are
//! required; every path has a default under the user's data or temp directory.

use std::path::PathBuf;
use thiserror::Error;

use crate::source::AirtableSettings;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("could not determine a data directory; set {0}")]
    NoDataDir(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub airtable: AirtableSettings,
    /// SQLite file backing the record store
    pub database_path: PathBuf,
    /// Root directory of the blob store
    pub blob_root: PathBuf,
    /// Where per-pass scratch directories are created
    pub scratch_root: PathBuf,
    /// Process-lifetime palette file
    pub palette_path: PathBuf,
    /// Where the archive of a successful pass is written
    pub output_path: PathBuf,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let airtable = AirtableSettings {
            endpoint: get("AIRTABLE_ENDPOINT").unwrap_or_else(|| "https://api.airtable.com".to_string()),
            api_key: required("AIRTABLE_API_KEY")?,
            base: required("AIRTABLE_BASE")?,
            table: get("AIRTABLE_TABLE").unwrap_or_else(|| "Larolds".to_string()),
            view: get("AIRTABLE_VIEW").unwrap_or_else(|| "Grid view".to_string()),
        };

        let database_path = match get("LAROLD_DATABASE") {
            Some(path) => PathBuf::from(path),
            None => data_dir("LAROLD_DATABASE")?.join("larolds.db"),
        };
        let blob_root = match get("LAROLD_BLOB_ROOT") {
            Some(path) => PathBuf::from(path),
            None => data_dir("LAROLD_BLOB_ROOT")?.join("blobs"),
        };

        let temp = std::env::temp_dir();
        let scratch_root = get("LAROLD_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| temp.clone());
        let palette_path = get("LAROLD_PALETTE")
            .map(PathBuf::from)
            .unwrap_or_else(|| temp.join("larold-sync").join("palette.png"));
        let output_path = get("LAROLD_OUTPUT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("larolds.zip"));

        Ok(Self {
            airtable,
            database_path,
            blob_root,
            scratch_root,
            palette_path,
            output_path,
        })
    }
}

/// Application data directory:
/// - Linux: ~/.local/share/larold-sync
/// - macOS: ~/Library/Application Support/larold-sync
/// - Windows: %APPDATA%\larold-sync
fn data_dir(override_key: &'static str) -> Result<PathBuf, ConfigError> {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or(ConfigError::NoDataDir(override_key))?;
    path.push("larold-sync");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_requires_credentials() {
        let err = Config::from_lookup(lookup(&[("AIRTABLE_BASE", "app123")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("AIRTABLE_API_KEY"));

        let err = Config::from_lookup(lookup(&[
            ("AIRTABLE_API_KEY", "key"),
            ("AIRTABLE_BASE", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("AIRTABLE_BASE"));
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("AIRTABLE_API_KEY", "key"),
            ("AIRTABLE_BASE", "app123"),
            ("LAROLD_DATABASE", "/var/lib/larold/db.sqlite"),
            ("LAROLD_BLOB_ROOT", "/var/lib/larold/blobs"),
            ("LAROLD_OUTPUT", "/tmp/out.zip"),
        ]))
        .unwrap();

        assert_eq!(config.airtable.endpoint, "https://api.airtable.com");
        assert_eq!(config.airtable.table, "Larolds");
        assert_eq!(config.airtable.view, "Grid view");
        assert_eq!(config.database_path, PathBuf::from("/var/lib/larold/db.sqlite"));
        assert_eq!(config.blob_root, PathBuf::from("/var/lib/larold/blobs"));
        assert_eq!(config.output_path, PathBuf::from("/tmp/out.zip"));
        assert!(config.palette_path.ends_with("larold-sync/palette.png"));
    }
}
