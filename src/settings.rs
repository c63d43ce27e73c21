//! Service settings, layered from built-in defaults, an optional TOML file
//! (`olog.toml`, or the path in `OLOG_CONFIG`) and `OLOG_*` environment
//! variables, later layers winning.

use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::PersistenceMode;

pub const DEFAULT_CONFIG_FILE: &str = "olog.toml";
const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Path of the SQLite database, or `:memory:`.
    pub database: String,
    pub bind: String,
    /// Per-query deadline in milliseconds; 0 disables it.
    pub query_timeout_ms: u64,
    /// Default `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let path = std::env::var("OLOG_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .set_default("database", "olog.db")?
            .set_default("bind", "127.0.0.1:8080")?
            .set_default("query_timeout_ms", 30_000)?
            .set_default("log_filter", "info")?
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("OLOG").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        if self.database == IN_MEMORY {
            PersistenceMode::InMemory
        } else {
            PersistenceMode::File(self.database.clone())
        }
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_ms > 0).then(|| Duration::from_millis(self.query_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.bind, "127.0.0.1:8080");
        assert_eq!(settings.query_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.persistence_mode(), PersistenceMode::File("olog.db".into()));
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "database = \":memory:\"\nquery_timeout_ms = 0\nlog_filter = \"olog=debug\"").unwrap();
        let settings = Settings::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.persistence_mode(), PersistenceMode::InMemory);
        assert_eq!(settings.query_timeout(), None);
        assert_eq!(settings.log_filter, "olog=debug");
        assert_eq!(settings.bind, "127.0.0.1:8080");
    }
}
