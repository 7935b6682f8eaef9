//! Container lifecycle management
//!
//! This module wraps a container runtime (Docker in production) behind the
//! [`ContainerRuntime`] trait and provides the request-scoped
//! [`ContainerHandle`], the bounded [`WorkerPool`] every runtime call goes
//! through, and the tar packing used to populate containers.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use crate::container::archive::pack_workspace;
pub use crate::container::docker::DockerRuntime;
pub use crate::container::handle::ContainerHandle;
pub use crate::container::pool::{PoolSlot, WorkerPool};
pub use crate::container::template::ContainerTemplate;

mod archive;
mod docker;
mod handle;
mod pool;
mod template;

/// Errors that occur while driving containers
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("failed to connect to docker at {host}: {message}")]
    Connect { host: String, message: String },

    #[error("image {image} is not available: {message}")]
    ImageUnavailable { image: String, message: String },

    #[error("failed to create container: {0}")]
    CreateFailed(String),

    #[error("failed to archive workspace: {0}")]
    Archive(#[source] std::io::Error),

    #[error("wait on container {0} ended without a status")]
    WaitEnded(String),

    #[error("container {0} reported no exit code")]
    MissingExitCode(String),

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("runtime task failed: {0}")]
    TaskFailed(String),

    #[error("container {0} was already removed")]
    Removed(String),

    #[error("{0}")]
    Runtime(String),
}

/// Output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn new(exit_code: i64, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of a deadline-bounded operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    TimedOut,
}

impl<T> Outcome<T> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::TimedOut => None,
        }
    }
}

/// Low-level container runtime operations, addressed by container id.
///
/// Implementations must be cheap to share; the engine holds one behind an
/// `Arc` and calls it from spawned tasks.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + fmt::Debug {
    /// Make sure `image` exists locally, pulling it if needed
    async fn ensure_image(&self, image: &str) -> Result<(), ContainerError>;

    /// Create a container and return its id
    async fn create(&self, template: &ContainerTemplate) -> Result<String, ContainerError>;

    /// Extract a tar archive into `path` inside the container
    async fn upload(&self, id: &str, path: &str, archive: Vec<u8>) -> Result<(), ContainerError>;

    async fn start(&self, id: &str) -> Result<(), ContainerError>;

    /// Block until the main process exits and return its exit code
    async fn wait(&self, id: &str) -> Result<i64, ContainerError>;

    /// Captured stdout/stderr and exit code of the main process
    async fn output(&self, id: &str) -> Result<ProcessOutput, ContainerError>;

    /// Run a command in the running container and wait for it
    async fn exec(
        &self,
        id: &str,
        command: Vec<String>,
        workdir: &str,
    ) -> Result<ProcessOutput, ContainerError>;

    /// Force-stop the main process
    async fn kill(&self, id: &str) -> Result<(), ContainerError>;

    /// Force-remove the container; removing a missing container succeeds
    async fn remove(&self, id: &str) -> Result<(), ContainerError>;
}
