//! TOML configuration loading and validation.

use std::path::Path;

use nanofolio::EngineConfig;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "nanofolio.toml";

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// env_logger filter used when `RUST_LOG` is unset (e.g. "debug").
    #[serde(default)]
    pub level: Option<String>,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse from a TOML string (useful for testing).
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it is the default path and
    /// does not exist. An explicitly named file must exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        if let Some(level) = &self.logging.level {
            if level.trim().is_empty() {
                return Err(Error::Config("logging.level must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Default log filter: the configured level, else "info".
    pub fn log_filter(&self) -> &str {
        self.logging.level.as_deref().unwrap_or("info")
    }
}
