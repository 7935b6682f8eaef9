//! Docker Engine backend for [`ContainerRuntime`]

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, KillContainerOptions,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
    WaitContainerOptions,
};
use bollard::{API_DEFAULT_VERSION, Docker};
use futures_util::StreamExt;
use tracing::{debug, instrument};

use crate::container::{ContainerError, ContainerRuntime, ContainerTemplate, ProcessOutput};

/// Seconds before a Docker API request times out
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// [`ContainerRuntime`] talking to the Docker Engine API
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to `host` (`unix://` socket or `http://`/`tcp://` address),
    /// or to the local defaults (`DOCKER_HOST` or the standard socket)
    pub fn connect(host: Option<&str>) -> Result<Self, ContainerError> {
        let docker = match host {
            None => Docker::connect_with_local_defaults(),
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(host) => {
                Docker::connect_with_http(host, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
        }
        .map_err(|e| ContainerError::Connect {
            host: host.unwrap_or("local defaults").to_owned(),
            message: e.to_string(),
        })?;

        Ok(Self::from_client(docker))
    }

    /// Wrap an existing client
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }

    async fn pull(&self, image: &str) -> Result<(), ContainerError> {
        let options = CreateImageOptions {
            from_image: Some(image.to_owned()),
            ..Default::default()
        };

        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(step) = progress.next().await {
            step.map_err(|e| ContainerError::ImageUnavailable {
                image: image.to_owned(),
                message: e.to_string(),
            })?;
        }
        debug!(image, "image pulled");
        Ok(())
    }
}

/// Translate a template into a Docker create body
fn create_body(template: &ContainerTemplate) -> ContainerCreateBody {
    let limits = template.resource_limits();
    let memory = i64::try_from(limits.memory).unwrap_or(i64::MAX);
    let network = template.network_enabled();

    ContainerCreateBody {
        image: Some(template.image().to_owned()),
        cmd: Some(template.cmd().to_vec()),
        env: Some(template.env_list()),
        working_dir: Some(template.workdir().to_owned()),
        network_disabled: Some(!network),
        attach_stdout: Some(false),
        attach_stderr: Some(false),
        tty: Some(false),
        host_config: Some(HostConfig {
            memory: Some(memory),
            memory_swap: Some(memory),
            cpu_period: Some(limits.cpu_period),
            cpu_quota: Some(limits.cpu_quota),
            network_mode: (!network).then(|| "none".to_owned()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn status_code(error: &BollardError) -> Option<u16> {
    match error {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

/// Append one chunk of a multiplexed stream to the matching buffer
fn append_log(chunk: LogOutput, stdout: &mut Vec<u8>, stderr: &mut Vec<u8>) {
    match chunk {
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            stdout.extend_from_slice(&message)
        }
        LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
        LogOutput::StdIn { .. } => {}
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    #[instrument(skip(self))]
    async fn ensure_image(&self, image: &str) -> Result<(), ContainerError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(404) => {
                debug!(image, "image missing, pulling");
                self.pull(image).await
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, template), fields(name = template.container_name()))]
    async fn create(&self, template: &ContainerTemplate) -> Result<String, ContainerError> {
        let options = CreateContainerOptions {
            name: Some(template.container_name().to_owned()),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), create_body(template))
            .await
            .map_err(|e| ContainerError::CreateFailed(e.to_string()))?;

        for warning in &response.warnings {
            debug!(%warning, "docker create warning");
        }
        Ok(response.id)
    }

    #[instrument(skip(self, archive), fields(bytes = archive.len()))]
    async fn upload(&self, id: &str, path: &str, archive: Vec<u8>) -> Result<(), ContainerError> {
        let options = UploadToContainerOptions {
            path: path.to_owned(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(id, Some(options), bollard::body_full(archive.into()))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn start(&self, id: &str) -> Result<(), ContainerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn wait(&self, id: &str) -> Result<i64, ContainerError> {
        let mut stream = self.docker.wait_container(id, None::<WaitContainerOptions>);
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exits as an error carrying the code
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(ContainerError::WaitEnded(id.to_owned())),
        }
    }

    #[instrument(skip(self))]
    async fn output(&self, id: &str) -> Result<ProcessOutput, ContainerError> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut logs = self.docker.logs(id, Some(options));
        while let Some(chunk) = logs.next().await {
            append_log(chunk?, &mut stdout, &mut stderr);
        }

        let exit_code = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?
            .state
            .and_then(|state| state.exit_code)
            .ok_or_else(|| ContainerError::MissingExitCode(id.to_owned()))?;

        Ok(ProcessOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    #[instrument(skip(self, command))]
    async fn exec(
        &self,
        id: &str,
        command: Vec<String>,
        workdir: &str,
    ) -> Result<ProcessOutput, ContainerError> {
        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(command),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: Some(workdir.to_owned()),
                    ..Default::default()
                },
            )
            .await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        if let StartExecResults::Attached { mut output, .. } = self
            .docker
            .start_exec(&exec.id, None::<StartExecOptions>)
            .await?
        {
            while let Some(chunk) = output.next().await {
                append_log(chunk?, &mut stdout, &mut stderr);
            }
        }

        let exit_code = self
            .docker
            .inspect_exec(&exec.id)
            .await?
            .exit_code
            .ok_or_else(|| ContainerError::MissingExitCode(id.to_owned()))?;

        Ok(ProcessOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    #[instrument(skip(self))]
    async fn kill(&self, id: &str) -> Result<(), ContainerError> {
        match self
            .docker
            .kill_container(id, None::<KillContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            // Already stopped
            Err(e) if matches!(status_code(&e), Some(304 | 409)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &str) -> Result<(), ContainerError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if status_code(&e) == Some(404) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
