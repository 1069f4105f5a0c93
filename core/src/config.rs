//! Configuration
//!
//! Layered, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file: `--config` / `CMDCHAIN_CONFIG_PATH`, else `cmdchain.toml`
//!    in the working directory if present
//! 3. `CMDCHAIN_*` environment variables, nested keys separated by `__`
//!    (`CMDCHAIN_ENGINE__MAX_COMMAND_FORK_COUNT=16`)
//!
//! A `.env` file is loaded into the environment first.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::execution::ExecutionLimits;

pub const ENV_PREFIX: &str = "CMDCHAIN";
pub const CONFIG_PATH_ENV: &str = "CMDCHAIN_CONFIG_PATH";
const DEFAULT_CONFIG_NAME: &str = "cmdchain";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
    /// Where `debug function` writes its trace files
    pub trace_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
            trace_dir: PathBuf::from("debug"),
        }
    }
}

/// Engine limits, named after the game rules they mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_command_chain_length: usize,
    pub max_command_fork_count: usize,
    pub max_queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_command_chain_length: ExecutionLimits::DEFAULT_COMMAND_LIMIT,
            max_command_fork_count: ExecutionLimits::DEFAULT_FORK_LIMIT,
            max_queue_depth: ExecutionLimits::DEFAULT_MAX_QUEUE_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            command_limit: self.max_command_chain_length,
            fork_limit: self.max_command_fork_count,
            max_queue_depth: self.max_queue_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` wins when set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "cmdchain_core=info".to_string(),
        }
    }
}

impl Config {
    /// Load with the default search path
    pub fn load() -> Result<Self> {
        Config::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore `.env` and `CMDCHAIN_*` variables
    pub fn without_environment(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config> {
        if !self.skip_env {
            // A missing .env is fine
            dotenvy::dotenv().ok();
        }

        let explicit = self.config_path.or_else(|| {
            if self.skip_env {
                None
            } else {
                env::var_os(CONFIG_PATH_ENV).map(PathBuf::from)
            }
        });

        let mut builder = config::Config::builder();
        builder = match &explicit {
            Some(path) => builder.add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Toml)
                    .required(true),
            ),
            None => builder.add_source(
                config::File::with_name(DEFAULT_CONFIG_NAME)
                    .format(config::FileFormat::Toml)
                    .required(false),
            ),
        };
        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let settings = builder.build().with_context(|| match &explicit {
            Some(path) => format!("Failed to read config file {}", path.display()),
            None => "Failed to read configuration".to_string(),
        })?;
        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use uuid::Uuid;

    use super::*;

    fn write_temp(contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("cmdchain-config-{}.toml", Uuid::new_v4()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_match_engine_limits() {
        let config = Config::default();
        assert_eq!(config.engine.limits(), ExecutionLimits::default());
        assert_eq!(config.trace_dir, PathBuf::from("debug"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_temp(
            r#"
            trace_dir = "/tmp/traces"

            [engine]
            max_command_fork_count = 16
        "#,
        );

        let config = Config::builder()
            .config_path(Some(path.clone()))
            .without_environment()
            .build()
            .unwrap();

        assert_eq!(config.engine.max_command_fork_count, 16);
        assert_eq!(
            config.engine.max_command_chain_length,
            ExecutionLimits::DEFAULT_COMMAND_LIMIT
        );
        assert_eq!(config.trace_dir, PathBuf::from("/tmp/traces"));
        assert_eq!(config.logging, LoggingConfig::default());

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = env::temp_dir().join(format!("cmdchain-missing-{}.toml", Uuid::new_v4()));

        let result = Config::builder()
            .config_path(Some(path))
            .without_environment()
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let path = write_temp("[engine]\nmax_queue_depth = \"lots\"\n");

        let result = Config::builder()
            .config_path(Some(path.clone()))
            .without_environment()
            .build();

        assert!(result.is_err());
        fs::remove_file(path).unwrap();
    }
}
