//! Configuration file loading for judgebox
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError, Language};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sample_interval_ms must be positive".to_owned(),
            ));
        }
        if self.compile_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "compile_timeout_ms must be positive".to_owned(),
            ));
        }
        if self.default_limits.time_limit_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "default time limit must be positive".to_owned(),
            ));
        }
        if self.default_limits.memory_limit_mb == Some(0) {
            return Err(ConfigError::Invalid(
                "default memory limit must be positive".to_owned(),
            ));
        }

        for language in Language::ALL {
            let toolchain = self.toolchain(language);
            if toolchain.run.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{language}' has empty run command"
                )));
            }
            if let Some(ref compile) = toolchain.compile
                && compile.is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{language}' has empty compile command"
                )));
            }
        }

        Ok(())
    }
}
