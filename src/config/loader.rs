//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and daemon config checks.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    /// A daemon index required by the address/transaction queries is disabled.
    MissingIndex(String),
    /// The daemon's ZMQ publishers are missing or disagree.
    Endpoint(String),
    /// Neither `spawn` nor `connect` is configured.
    NoNodes,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::MissingIndex(msg) => write!(f, "{}", msg),
            ConfigError::Endpoint(msg) => write!(f, "{}", msg),
            ConfigError::NoNodes => write!(
                f,
                "Alterdot configuration options \"spawn\" or \"connect\" are expected"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// A relative `spawn.datadir` is resolved against the directory holding the file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: ServiceConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    if let Some(spawn) = config.spawn.as_mut() {
        if spawn.datadir.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            spawn.datadir = base.join(&spawn.datadir);
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
