//! Process configuration
//!
//! Read once at startup from the environment (after `.env` is loaded by the
//! binary). CLI flags may override individual values afterwards.

use crate::errors::{HbnbError, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_STORAGE: &str = "HBNB_TYPE_STORAGE";
pub const ENV_FILE_PATH: &str = "HBNB_FILE_PATH";
pub const ENV_DB_NAME: &str = "HBNB_DB_NAME";
pub const ENV_MODE: &str = "HBNB_ENV";

pub const DEFAULT_FILE_PATH: &str = "file.json";
pub const DEFAULT_DB_NAME: &str = "hbnb.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    File,
    Db,
}

impl FromStr for StorageKind {
    type Err = HbnbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" | "fs" => Ok(StorageKind::File),
            "db" | "sqlite" => Ok(StorageKind::Db),
            other => Err(HbnbError::Config(format!(
                "{}={} (expected `file` or `db`)",
                ENV_STORAGE, other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub storage: StorageKind,
    pub file_path: PathBuf,
    /// SQLite database path, or `:memory:`
    pub db_name: String,
    /// `HBNB_ENV=test`: relational tables are dropped on open
    pub test_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageKind::File,
            file_path: PathBuf::from(DEFAULT_FILE_PATH),
            db_name: DEFAULT_DB_NAME.to_string(),
            test_mode: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(kind) = get(ENV_STORAGE) {
            config.storage = kind.parse()?;
        }
        if let Some(path) = get(ENV_FILE_PATH) {
            config.file_path = PathBuf::from(path);
        }
        if let Some(name) = get(ENV_DB_NAME) {
            config.db_name = name;
        }
        config.test_mode = get(ENV_MODE).map_or(false, |mode| mode == "test");

        Ok(config)
    }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage, StorageKind::File);
    }

    #[test]
    fn test_db_selection() {
        let config = Config::from_lookup(lookup(&[
            (ENV_STORAGE, "db"),
            (ENV_DB_NAME, ":memory:"),
            (ENV_MODE, "test"),
        ]))
        .unwrap();

        assert_eq!(config.storage, StorageKind::Db);
        assert_eq!(config.db_name, ":memory:");
        assert!(config.test_mode);
    }

    #[test]
    fn test_unknown_storage_kind_rejected() {
        let err = Config::from_lookup(lookup(&[(ENV_STORAGE, "mongo")])).unwrap_err();
        assert!(matches!(err, HbnbError::Config(_)));
    }

    #[test]
    fn test_empty_values_fall_back() {
        let config =
            Config::from_lookup(lookup(&[(ENV_FILE_PATH, ""), (ENV_STORAGE, " ")])).unwrap();
        assert_eq!(config.file_path, PathBuf::from(DEFAULT_FILE_PATH));
        assert_eq!(config.storage, StorageKind::File);
    }
}
