//! Execution engine for Dockcube
//!
//! Turns an [`ExecutionRequest`] into an [`ExecutionResult`]: resolves the
//! language, materializes the workspace, then runs either a single container
//! (no tests) or one long-lived container for a whole test suite.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use crate::runner::command::{Program, ShellCommand, quote, test_invocation};
pub use crate::runner::report::{SuiteReport, inline_note, timeout_message, transcript};

mod batch;
mod command;
mod report;
mod single;

use crate::{
    config::{Config, Language},
    container::{
        ContainerError, ContainerHandle, ContainerRuntime, ContainerTemplate, DockerRuntime,
        WorkerPool,
    },
    types::{ExecutionRequest, ExecutionResult},
    workspace::{Workspace, WorkspaceError, resolve_language},
};

/// Errors surfaced to the caller; container failures become results instead
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Lifecycle states of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    WorkspaceReady,
    ContainerCreated,
    Populated,
    Running,
    Completed,
    TimedOut,
    SetupFailed,
    CleanedUp,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "INIT",
            RunState::WorkspaceReady => "WORKSPACE_READY",
            RunState::ContainerCreated => "CONTAINER_CREATED",
            RunState::Populated => "POPULATED",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::TimedOut => "TIMED_OUT",
            RunState::SetupFailed => "SETUP_FAILED",
            RunState::CleanedUp => "CLEANED_UP",
        };
        f.write_str(name)
    }
}

/// Tracks and logs state transitions of one request
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: RunState,
    mode: &'static str,
}

impl Lifecycle {
    fn new(mode: &'static str) -> Self {
        Self {
            state: RunState::Init,
            mode,
        }
    }

    pub(crate) fn advance(&mut self, next: RunState) {
        debug!(mode = self.mode, from = %self.state, to = %next, "state transition");
        self.state = next;
    }
}

/// High-level runner for code execution
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    runtime: Arc<dyn ContainerRuntime>,
    pool: WorkerPool,
}

impl Runner {
    /// Create a runner on top of an existing container runtime
    pub fn new(config: Config, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let pool = WorkerPool::new(config.workers);
        Self {
            config: Arc::new(config),
            runtime,
            pool,
        }
    }

    /// Create a runner connected to the Docker daemon named in `config`
    pub fn connect(config: Config) -> Result<Self, ContainerError> {
        let runtime = DockerRuntime::connect(config.docker_host.as_deref())?;
        Ok(Self::new(config, Arc::new(runtime)))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the worker pool shared by every request of this runner
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Execute a request.
    ///
    /// Errors are returned only for problems with the request itself
    /// (language, files, timeout). Container failures and deadlines are
    /// reported inside the [`ExecutionResult`]. The workspace and container
    /// are removed before this returns.
    #[instrument(
        skip(self, request),
        fields(language = %request.language, files = request.files.len())
    )]
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, ExecuteError> {
        if request.timeout_seconds == 0 {
            return Err(ExecuteError::InvalidRequest(
                "timeout must be at least 1 second".to_owned(),
            ));
        }

        let language = resolve_language(&request.files, &request.language)
            .ok_or_else(|| ExecuteError::UnsupportedLanguage(request.language.clone()))?;

        let tests = request.tests();
        let mut lifecycle = Lifecycle::new(if tests.is_some() { "batch" } else { "single" });

        let mut workspace = Workspace::materialize(
            self.config.workspace_root.as_deref(),
            &request.files,
            language,
        )
        .await?;
        lifecycle.advance(RunState::WorkspaceReady);

        let deadline = Duration::from_secs(request.timeout_seconds);
        let result = match tests {
            None => single::run(self, &workspace, deadline, &mut lifecycle).await,
            Some(tests) => batch::run(self, &workspace, tests, deadline, &mut lifecycle).await,
        };

        if let Err(e) = workspace.cleanup() {
            warn!(error = %e, "workspace cleanup failed");
        }
        lifecycle.advance(RunState::CleanedUp);

        result.map_err(ExecuteError::from)
    }

    /// Container template for `language` with the configured limits
    pub(crate) fn template(&self, language: Language) -> ContainerTemplate {
        let profile = language.profile();
        profile.env.iter().fold(
            ContainerTemplate::new(self.config.image_for(language))
                .working_dir(&self.config.workdir)
                .limits(self.config.limits.clone())
                .network(profile.requires_network),
            |template, (key, value)| template.env(*key, *value),
        )
    }

    /// Make the image available (when configured) and create the container
    pub(crate) async fn provision(
        &self,
        template: ContainerTemplate,
    ) -> Result<ContainerHandle, ContainerError> {
        if self.config.pull_images {
            let runtime = self.runtime.clone();
            let image = template.image().to_owned();
            self.pool
                .dispatch(async move { runtime.ensure_image(&image).await })
                .await?;
        }
        ContainerHandle::create(self.runtime.clone(), self.pool.clone(), template).await
    }
}

/// `.ts` sources of the workspace, empty for other languages
pub(crate) fn ts_sources(workspace: &Workspace) -> Result<Vec<String>, WorkspaceError> {
    match workspace.language() {
        Language::TypeScript => workspace.files_with_extension("ts"),
        _ => Ok(Vec::new()),
    }
}
