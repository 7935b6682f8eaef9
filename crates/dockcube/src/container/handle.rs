//! Request-scoped container handles
//!
//! A [`ContainerHandle`] owns one created container and guarantees it is
//! removed exactly once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::container::archive::pack_workspace;
use crate::container::{
    ContainerError, ContainerRuntime, ContainerTemplate, Outcome, ProcessOutput, WorkerPool,
};
use crate::workspace::Workspace;

/// Shell command that kills every process in the container except PID 1
const KILL_ALL_PROCESSES: &str = "kill -9 -1";

/// A created container bound to one request
///
/// # Cleanup
///
/// **Important:** Always call [`remove()`](Self::remove) before dropping the
/// handle. `Drop` logs a warning and spawns a best-effort removal on the
/// current tokio runtime, which may not complete before process exit.
///
/// ```rust,ignore
/// let mut handle = ContainerHandle::create(runtime, pool, template).await?;
/// // ... populate, start, wait ...
/// handle.remove().await;
/// ```
#[derive(Debug)]
pub struct ContainerHandle {
    id: String,
    name: String,
    workdir: String,
    runtime: Arc<dyn ContainerRuntime>,
    pool: WorkerPool,
    removed: bool,
}

impl ContainerHandle {
    /// Create a container from `template`
    #[instrument(skip(runtime, pool, template), fields(image = template.image()))]
    pub async fn create(
        runtime: Arc<dyn ContainerRuntime>,
        pool: WorkerPool,
        template: ContainerTemplate,
    ) -> Result<Self, ContainerError> {
        let name = template.container_name().to_owned();
        let workdir = template.workdir().to_owned();

        let rt = runtime.clone();
        let id = pool
            .dispatch(async move { rt.create(&template).await })
            .await?;

        debug!(%id, %name, "container created");

        Ok(Self {
            id,
            name,
            workdir,
            runtime,
            pool,
            removed: false,
        })
    }

    /// Get the container id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the container name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the container has not been removed yet
    pub fn is_live(&self) -> bool {
        !self.removed
    }

    /// Copy the workspace's files into the container's working directory
    /// as a single archive transfer
    #[instrument(skip(self, workspace), fields(id = %self.id))]
    pub async fn populate(&self, workspace: &Workspace) -> Result<(), ContainerError> {
        self.ensure_live()?;
        let archive = pack_workspace(workspace)?;
        debug!(bytes = archive.len(), "uploading workspace");

        let rt = self.runtime.clone();
        let id = self.id.clone();
        let workdir = self.workdir.clone();
        self.pool
            .dispatch(async move { rt.upload(&id, &workdir, archive).await })
            .await
    }

    /// Start the container's main process
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn start(&self) -> Result<(), ContainerError> {
        self.ensure_live()?;
        let rt = self.runtime.clone();
        let id = self.id.clone();
        self.pool.dispatch(async move { rt.start(&id).await }).await
    }

    /// Wait for the main process to exit, up to `deadline`.
    ///
    /// The deadline starts once a pool slot is held. On deadline the
    /// container is force-stopped and `TimedOut` returned.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn await_completion(
        &self,
        deadline: Duration,
    ) -> Result<Outcome<i64>, ContainerError> {
        self.ensure_live()?;
        let slot = self.pool.acquire().await?;
        let rt = self.runtime.clone();
        let id = self.id.clone();
        let wait = slot.run(async move { rt.wait(&id).await });

        match tokio::time::timeout(deadline, wait).await {
            Ok(exit_code) => Ok(Outcome::Completed(exit_code?)),
            Err(_) => {
                debug!(?deadline, "deadline exceeded, killing container");
                // Teardown bypasses the pool: the wait it cancels still holds a slot.
                if let Err(e) = self.runtime.kill(&self.id).await {
                    warn!(error = %e, "failed to kill timed out container");
                }
                Ok(Outcome::TimedOut)
            }
        }
    }

    /// Captured output and exit code of the main process
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn collect_output(&self) -> Result<ProcessOutput, ContainerError> {
        self.ensure_live()?;
        let rt = self.runtime.clone();
        let id = self.id.clone();
        self.pool.dispatch(async move { rt.output(&id).await }).await
    }

    /// Run `command` in the running container, up to `deadline`.
    ///
    /// The deadline starts once a pool slot is held. On deadline every
    /// process except the container's init is killed, so the container
    /// stays usable for the next command.
    #[instrument(skip(self, command), fields(id = %self.id))]
    pub async fn exec(
        &self,
        command: Vec<String>,
        deadline: Duration,
    ) -> Result<Outcome<ProcessOutput>, ContainerError> {
        self.ensure_live()?;
        let slot = self.pool.acquire().await?;
        let rt = self.runtime.clone();
        let id = self.id.clone();
        let workdir = self.workdir.clone();
        let exec = slot.run(async move { rt.exec(&id, command, &workdir).await });

        match tokio::time::timeout(deadline, exec).await {
            Ok(output) => Ok(Outcome::Completed(output?)),
            Err(_) => {
                debug!(?deadline, "exec deadline exceeded, killing processes");
                let kill = vec![
                    "/bin/sh".to_owned(),
                    "-c".to_owned(),
                    KILL_ALL_PROCESSES.to_owned(),
                ];
                if let Err(e) = self.runtime.exec(&self.id, kill, &self.workdir).await {
                    warn!(error = %e, "failed to kill timed out exec");
                }
                Ok(Outcome::TimedOut)
            }
        }
    }

    /// Force-remove the container.
    ///
    /// Idempotent: only the first call reaches the runtime, and the handle is
    /// marked removed even if that call fails.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn remove(&mut self) -> Result<(), ContainerError> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;

        match self.runtime.remove(&self.id).await {
            Ok(()) => {
                debug!("container removed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to remove container");
                Err(e)
            }
        }
    }

    fn ensure_live(&self) -> Result<(), ContainerError> {
        if self.removed {
            return Err(ContainerError::Removed(self.id.clone()));
        }
        Ok(())
    }
}

impl Drop for ContainerHandle {
    fn drop(&mut self) {
        if self.removed {
            return;
        }

        warn!(
            id = %self.id,
            name = %self.name,
            "ContainerHandle dropped without explicit removal! \
             Call remove() before dropping. Attempting best-effort removal."
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let runtime = self.runtime.clone();
                let id = self.id.clone();
                handle.spawn(async move {
                    match runtime.remove(&id).await {
                        Ok(()) => debug!(%id, "best-effort removal succeeded"),
                        Err(e) => warn!(%id, error = %e, "best-effort removal failed"),
                    }
                });
            }
            Err(_) => {
                warn!(id = %self.id, "no tokio runtime available, container leaked");
            }
        }
    }
}
