//! A library for running untrusted code in Docker containers.
//!
//! Dockcube accepts a submission (source files plus an optional ordered test
//! suite), builds and runs it inside a resource-capped container and returns
//! a structured result with a verdict.
//!
//! # Features
//!
//! - **Multi-language** - Python, TypeScript, Go and Java, detected from file extensions.
//! - **Single-run mode** - One container builds and runs the program once.
//! - **Batch test suites** - One container per suite: transfer and build once,
//!   run every test via exec.
//! - **Resource limits** - Memory and CPU caps, network disabled unless the language needs it.
//! - **Deadlines** - Timed out runs and tests are force-stopped and reported, not raised.
//! - **Guaranteed cleanup** - Workspaces and containers are removed on every path.
//! - **TOML configuration** - Layered with `DOCKCUBE_*` environment overrides.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language, LanguageProfile};
pub use container::{
    ContainerError, ContainerHandle, ContainerRuntime, ContainerTemplate, DockerRuntime, Outcome,
    PoolSlot, ProcessOutput, WorkerPool,
};
pub use runner::{ExecuteError, RunState, Runner};
pub use types::{
    ExecutionRequest, ExecutionResult, ResourceLimits, SourceFiles, TestCase, TestResult, Verdict,
};
pub use workspace::{Workspace, WorkspaceError};

pub mod config;
pub mod container;
pub mod runner;
pub mod types;
pub mod workspace;
