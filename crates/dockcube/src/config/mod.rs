use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::language::{Language, LanguageProfile};
use crate::types::{DEFAULT_TIMEOUT_SECONDS, ResourceLimits};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../dockcube.example.toml");

/// Prefix for environment variable overrides (e.g. `DOCKCUBE_WORKERS=8`)
pub const ENV_PREFIX: &str = "DOCKCUBE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' is not supported")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for Dockcube
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Docker endpoint (`unix://...` or `http://...`); local defaults if unset
    #[serde(default)]
    pub docker_host: Option<String>,

    /// Host directory under which per-request workspaces are created.
    ///
    /// Defaults to the system temp directory.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    /// Working directory inside every container
    #[serde(default = "default_workdir")]
    pub workdir: String,

    /// Maximum number of container runtime calls in flight
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deadline in seconds used when a request does not carry one
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,

    /// Lifetime of the keepalive process in batch containers
    #[serde(default = "default_keepalive")]
    pub keepalive_seconds: u64,

    /// Pull missing images before creating containers
    #[serde(default)]
    pub pull_images: bool,

    /// Resource caps applied to every container
    #[serde(default)]
    pub limits: ResourceLimits,

    /// Per-language image overrides
    #[serde(default)]
    pub images: HashMap<Language, String>,
}

impl Config {
    /// Create a new config from the embedded example
    pub fn new() -> Self {
        Self::default()
    }

    /// Image to run a language in, honoring overrides
    pub fn image_for(&self, language: Language) -> &str {
        self.images
            .get(&language)
            .map(String::as_str)
            .unwrap_or(language.profile().image)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_workdir() -> String {
    "/workspace".to_owned()
}

fn default_workers() -> usize {
    4
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_keepalive() -> u64 {
    3600
}
