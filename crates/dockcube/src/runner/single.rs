//! Single-run mode: one container runs the program once

use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::container::{ContainerError, ContainerHandle, Outcome, ProcessOutput};
use crate::runner::command::Program;
use crate::runner::{Lifecycle, RunState, Runner, report, ts_sources};
use crate::types::ExecutionResult;
use crate::workspace::{Workspace, WorkspaceError};

#[instrument(skip_all, fields(language = %workspace.language()))]
pub(crate) async fn run(
    runner: &Runner,
    workspace: &Workspace,
    deadline: Duration,
    lifecycle: &mut Lifecycle,
) -> Result<ExecutionResult, WorkspaceError> {
    let started = Instant::now();
    let ts_files = ts_sources(workspace)?;
    let program = Program::new(workspace.language(), workspace.main_file(), &ts_files);
    let command = program.single_run();
    debug!(command = %command.render(), "single-run command");

    let template = runner
        .template(workspace.language())
        .command(command.into_argv());

    let mut handle = match runner.provision(template).await {
        Ok(handle) => handle,
        Err(e) => {
            lifecycle.advance(RunState::SetupFailed);
            return Ok(report::setup_failure(&e, started.elapsed(), false));
        }
    };
    lifecycle.advance(RunState::ContainerCreated);

    let outcome = drive(&handle, workspace, deadline, lifecycle).await;
    // Errors are logged by the handle; the container is gone either way
    let _ = handle.remove().await;

    let elapsed = started.elapsed();
    Ok(match outcome {
        Ok(Outcome::Completed(output)) => {
            lifecycle.advance(RunState::Completed);
            report::single_run(output, elapsed)
        }
        Ok(Outcome::TimedOut) => {
            lifecycle.advance(RunState::TimedOut);
            report::single_run_timeout(deadline.as_secs(), elapsed)
        }
        Err(e) => {
            lifecycle.advance(RunState::SetupFailed);
            report::setup_failure(&e, elapsed, false)
        }
    })
}

async fn drive(
    handle: &ContainerHandle,
    workspace: &Workspace,
    deadline: Duration,
    lifecycle: &mut Lifecycle,
) -> Result<Outcome<ProcessOutput>, ContainerError> {
    handle.populate(workspace).await?;
    lifecycle.advance(RunState::Populated);

    handle.start().await?;
    lifecycle.advance(RunState::Running);

    match handle.await_completion(deadline).await? {
        Outcome::TimedOut => Ok(Outcome::TimedOut),
        Outcome::Completed(exit_code) => {
            let mut output = handle.collect_output().await?;
            output.exit_code = exit_code;
            Ok(Outcome::Completed(output))
        }
    }
}
