//! Configuration file loading for Dockcube
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};

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

    /// Load the layered configuration: embedded defaults, then the optional
    /// file, then `DOCKCUBE_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `DOCKCUBE_LIMITS__MEMORY`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_owned()));
        }
        if self.default_timeout == 0 {
            return Err(ConfigError::Invalid(
                "default_timeout must be at least 1 second".to_owned(),
            ));
        }
        if self.keepalive_seconds == 0 {
            return Err(ConfigError::Invalid(
                "keepalive_seconds must be at least 1 second".to_owned(),
            ));
        }
        if !self.workdir.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "workdir '{}' must be an absolute path",
                self.workdir
            )));
        }
        if self.limits.memory == 0 {
            return Err(ConfigError::Invalid("limits.memory must be non-zero".to_owned()));
        }
        if self.limits.cpu_quota <= 0 || self.limits.cpu_period <= 0 {
            return Err(ConfigError::Invalid(
                "limits.cpu_quota and limits.cpu_period must be positive".to_owned(),
            ));
        }
        for (language, image) in &self.images {
            if image.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "image override for '{language}' is empty"
                )));
            }
        }

        Ok(())
    }
}
