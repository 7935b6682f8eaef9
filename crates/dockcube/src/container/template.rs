//! Container creation settings
//!
//! Builder for everything a container is created with: image, command,
//! environment, working directory, resource caps and network policy.

use crate::types::ResourceLimits;

/// Builder for container creation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTemplate {
    name: String,
    image: String,
    command: Vec<String>,
    env: Vec<(String, String)>,
    workdir: String,
    limits: ResourceLimits,
    network: bool,
}

impl ContainerTemplate {
    /// Create a template for `image` with a generated `dockcube-<uuid>` name
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: format!("dockcube-{}", uuid::Uuid::new_v4()),
            image: image.into(),
            command: Vec::new(),
            env: Vec::new(),
            workdir: "/workspace".to_owned(),
            limits: ResourceLimits::default(),
            network: false,
        }
    }

    /// Set the command of the main process
    pub fn command(mut self, cmd: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.command = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory inside the container
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = dir.into();
        self
    }

    /// Set resource limits
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Allow outbound network access
    pub fn network(mut self, enable: bool) -> Self {
        self.network = enable;
        self
    }

    pub fn container_name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn cmd(&self) -> &[String] {
        &self.command
    }

    /// `KEY=value` pairs as the Docker API expects them
    pub fn env_list(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    pub fn workdir(&self) -> &str {
        &self.workdir
    }

    pub fn resource_limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn network_enabled(&self) -> bool {
        self.network
    }
}
