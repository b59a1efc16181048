//! Server configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::projection::ScreenTransform;
use crate::regions::DEFAULT_BIN_DEGREES;
use crate::source::SqliteSourceConfig;

/// Environment variable naming the config file when no argument is given
pub const CONFIG_ENV: &str = "LAYER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Region bin size in degrees
    pub bin_degrees: f64,
    /// Record database; without one the server answers region queries only
    pub database: Option<PathBuf>,
    pub source: SqliteSourceConfig,
    /// Period of the UI pump clock
    pub clock_period_ms: u64,
    pub logging: LoggingConfig,
    pub screen: ScreenTransform,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            bin_degrees: DEFAULT_BIN_DEGREES,
            database: None,
            source: SqliteSourceConfig::default(),
            clock_period_ms: 50,
            logging: LoggingConfig::default(),
            screen: ScreenTransform::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Also write a session log file
    pub file: bool,
    pub directory: String,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: true,
            directory: "logs".to_string(),
            file_name: "layer_server.log".to_string(),
        }
    }
}

impl LayerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// First CLI argument, then `LAYER_CONFIG`, then defaults
    pub fn load(arg: Option<String>) -> Result<Self, ConfigError> {
        match arg.or_else(|| std::env::var(CONFIG_ENV).ok()) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.bin_degrees > 0.0 && self.bin_degrees <= 180.0) {
            return Err(ConfigError::Invalid(format!(
                "bin_degrees must be in (0, 180], got {}",
                self.bin_degrees
            )));
        }
        if self.clock_period_ms == 0 {
            return Err(ConfigError::Invalid("clock_period_ms must be positive".to_string()));
        }
        if !(self.screen.pixels_per_degree > 0.0) {
            return Err(ConfigError::Invalid(
                "screen.pixels_per_degree must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_gives_defaults() {
        let config: LayerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LayerConfig::default());
        assert_eq!(config.source.table, "records");
        assert_eq!(config.logging.file_name, "layer_server.log");
    }

    #[test]
    fn partial_file_overrides_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"bin_degrees": 10, "database": "data.db", "source": {{"table": "obs", "west_longitude": true}}}}"#
        )
        .unwrap();

        let config = LayerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bin_degrees, 10.0);
        assert_eq!(config.database, Some(PathBuf::from("data.db")));
        assert_eq!(config.source.table, "obs");
        assert!(config.source.west_longitude);
        assert_eq!(config.source.key_column, "record_key");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"bin_degrees": 0}}"#).unwrap();
        assert!(matches!(
            LayerConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(
            LayerConfig::from_file(bad.path()),
            Err(ConfigError::Parse { .. })
        ));

        assert!(matches!(
            LayerConfig::from_file("/nonexistent/layer.json"),
            Err(ConfigError::Read { .. })
        ));
    }
}
