//! Runtime configuration. Values resolve in layers: built-in defaults rooted
//! in the per-user data directory, then an optional `config.toml`, then
//! environment overrides. Command-line flags are applied last by `main`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

use crate::catalog::{default_catalog, sample_roster, CatalogEntry, ChoristerSeed};

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".choir-instrument-ledger";
const DB_FILE_NAME: &str = "ledger.sqlite";
const LOG_FILE_NAME: &str = "ledger.log";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const DB_ENV: &str = "INSTRUMENT_LEDGER_DB";
pub const LOG_ENV: &str = "INSTRUMENT_LEDGER_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: PathBuf,
    pub log_file: PathBuf,
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,
    pub instruments: Vec<CatalogEntry>,
    pub choristers: Vec<ChoristerSeed>,
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database: Option<PathBuf>,
    log_file: Option<PathBuf>,
    log_level: Option<String>,
    instruments: Option<Vec<CatalogEntry>>,
    choristers: Option<Vec<ChoristerSeed>>,
}

impl Config {
    /// Defaults with every file placed inside `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            database: data_dir.join(DB_FILE_NAME),
            log_file: data_dir.join(LOG_FILE_NAME),
            log_level: "info".to_string(),
            instruments: default_catalog(),
            choristers: sample_roster(),
        }
    }

    /// Resolve the configuration. An explicit `config_path` must exist; the
    /// default one in the data directory is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let data_dir = data_dir()?;
        let mut config = Self::with_data_dir(&data_dir);

        match config_path {
            Some(path) => {
                let file = read_file_config(path)?;
                config.apply_file(file);
            }
            None => {
                let path = data_dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    let file = read_file_config(&path)?;
                    config.apply_file(file);
                }
            }
        }

        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            self.database = database;
        }
        if let Some(log_file) = file.log_file {
            self.log_file = log_file;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        if let Some(instruments) = file.instruments {
            self.instruments = instruments;
        }
        if let Some(choristers) = file.choristers {
            self.choristers = choristers;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(database) = lookup(DB_ENV).filter(|v| !v.trim().is_empty()) {
            self.database = PathBuf::from(database);
        }
        if let Some(log_file) = lookup(LOG_ENV).filter(|v| !v.trim().is_empty()) {
            self.log_file = PathBuf::from(log_file);
        }
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

/// Resolve the absolute path to the data directory inside the user's home.
fn data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
database = "/srv/ledger/loans.sqlite"
log_level = "debug"

[[instruments]]
type = "Violin"
quantity = 2

[[choristers]]
name = "Ada"
division = "Adult Choir"
"#,
        )
        .unwrap();

        let mut config = Config::with_data_dir(dir.path());
        config.apply_file(read_file_config(&path).unwrap());

        assert_eq!(config.database, PathBuf::from("/srv/ledger/loans.sqlite"));
        assert_eq!(config.log_file, dir.path().join(LOG_FILE_NAME));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.instruments, vec![CatalogEntry::new("Violin", 2)]);
        assert_eq!(
            config.choristers,
            vec![ChoristerSeed::new("Ada", "Adult Choir")]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "databse = \"typo.sqlite\"\n").unwrap();

        let err = read_file_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config file"));
    }

    #[test]
    fn env_overrides_paths_but_ignores_blank_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        let vars: HashMap<&str, &str> =
            HashMap::from([(DB_ENV, "/tmp/other.sqlite"), (LOG_ENV, "  ")]);

        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database, PathBuf::from("/tmp/other.sqlite"));
        assert_eq!(config.log_file, dir.path().join(LOG_FILE_NAME));
    }
}
