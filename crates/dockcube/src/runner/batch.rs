//! Batch test-suite mode
//!
//! One long-lived container per request: the workspace is transferred and
//! built once, then every test runs sequentially through `exec`.

use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::container::{ContainerError, ContainerHandle, Outcome};
use crate::runner::command::{Program, ShellCommand, test_invocation};
use crate::runner::report::{self, SuiteReport, build_diagnostic, timeout_message};
use crate::runner::{Lifecycle, RunState, Runner, ts_sources};
use crate::types::{ExecutionResult, TestCase};
use crate::workspace::{Workspace, WorkspaceError};

/// Slack added to the keepalive beyond the suite's worst-case duration
const KEEPALIVE_MARGIN_SECS: u64 = 300;

/// Lifetime of the keepalive process.
///
/// At least `configured`, and never shorter than a build plus every test
/// each running to the deadline.
fn keepalive_seconds(configured: u64, deadline: Duration, tests: usize) -> u64 {
    let steps = u64::try_from(tests).unwrap_or(u64::MAX).saturating_add(1);
    let worst_case = deadline
        .as_secs()
        .saturating_mul(steps)
        .saturating_add(KEEPALIVE_MARGIN_SECS);
    configured.max(worst_case)
}

#[instrument(skip_all, fields(language = %workspace.language(), tests = tests.len()))]
pub(crate) async fn run(
    runner: &Runner,
    workspace: &Workspace,
    tests: &[TestCase],
    deadline: Duration,
    lifecycle: &mut Lifecycle,
) -> Result<ExecutionResult, WorkspaceError> {
    let started = Instant::now();
    let ts_files = ts_sources(workspace)?;
    let program = Program::new(workspace.language(), workspace.main_file(), &ts_files);

    let keepalive =
        keepalive_seconds(runner.config().keepalive_seconds, deadline, tests.len()).to_string();
    let template = runner
        .template(workspace.language())
        .command(["sleep", keepalive.as_str()]);

    let mut handle = match runner.provision(template).await {
        Ok(handle) => handle,
        Err(e) => {
            lifecycle.advance(RunState::SetupFailed);
            return Ok(report::setup_failure(&e, started.elapsed(), true));
        }
    };
    lifecycle.advance(RunState::ContainerCreated);

    let outcome = run_suite(&handle, workspace, &program, tests, deadline, lifecycle).await;
    let _ = handle.remove().await;

    let elapsed = started.elapsed();
    Ok(match outcome {
        Ok(suite) => {
            lifecycle.advance(RunState::Completed);
            suite.finish(elapsed)
        }
        Err(e) => {
            lifecycle.advance(RunState::SetupFailed);
            report::setup_failure(&e, elapsed, true)
        }
    })
}

async fn run_suite(
    handle: &ContainerHandle,
    workspace: &Workspace,
    program: &Program<'_>,
    tests: &[TestCase],
    deadline: Duration,
    lifecycle: &mut Lifecycle,
) -> Result<SuiteReport, ContainerError> {
    handle.populate(workspace).await?;
    lifecycle.advance(RunState::Populated);

    handle.start().await?;
    lifecycle.advance(RunState::Running);

    let mut suite = SuiteReport::new();

    if let Some(build) = program.build_step()
        && let Some((exit_code, diagnostic)) = build_once(handle, build, deadline).await?
    {
        debug!(exit_code, "build failed, skipping tests");
        suite.fail_build(tests, exit_code, &diagnostic);
        return Ok(suite);
    }

    let runner = program.runner();
    debug!(runner = %runner.render(), "running tests");

    for (idx, test) in tests.iter().enumerate() {
        let test_started = Instant::now();
        match handle.exec(test_invocation(&runner, &test.input), deadline).await {
            Ok(Outcome::Completed(output)) => {
                suite.record(test, &output, test_started.elapsed());
            }
            Ok(Outcome::TimedOut) => {
                debug!(test = idx + 1, "test timed out");
                suite.record_timeout(test, deadline.as_secs(), test_started.elapsed());
            }
            Err(e) => {
                debug!(test = idx + 1, error = %e, "test could not run");
                suite.record_error(test, &e, test_started.elapsed());
            }
        }
    }

    Ok(suite)
}

/// Run the build step; on failure return its exit code and diagnostic
async fn build_once(
    handle: &ContainerHandle,
    build: ShellCommand,
    deadline: Duration,
) -> Result<Option<(i64, String)>, ContainerError> {
    debug!(command = %build.render(), "building");
    match handle.exec(build.into_argv(), deadline).await? {
        Outcome::Completed(output) if output.success() => Ok(None),
        Outcome::Completed(output) => Ok(Some((output.exit_code, build_diagnostic(&output)))),
        Outcome::TimedOut => Ok(Some((-1, timeout_message(deadline.as_secs())))),
    }
}
