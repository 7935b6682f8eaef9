//! Result assembly
//!
//! Pure functions turning process outputs and elapsed time into
//! [`ExecutionResult`]s and [`TestResult`]s.

use std::time::Duration;

use crate::container::{ContainerError, ProcessOutput};
use crate::types::{ExecutionResult, TestCase, TestResult, Verdict};

/// Message reported when a deadline is exceeded
pub fn timeout_message(seconds: u64) -> String {
    format!("Execution timeout after {seconds} seconds")
}

/// Append `stderr` to trimmed program output as an inline diagnostic
pub fn inline_note(actual: &str, stderr: &str) -> String {
    let stderr = stderr.trim();
    match (actual.is_empty(), stderr.is_empty()) {
        (_, true) => actual.to_owned(),
        (true, false) => format!("Error: {stderr}"),
        (false, false) => format!("{actual}\nError: {stderr}"),
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Result of a single run that completed on its own.
///
/// stderr is surfaced only for a non-zero exit with non-blank stderr.
pub fn single_run(output: ProcessOutput, elapsed: Duration) -> ExecutionResult {
    let stderr = if output.exit_code != 0 && !output.stderr.trim().is_empty() {
        output.stderr
    } else {
        String::new()
    };

    ExecutionResult {
        stdout: output.stdout,
        stderr,
        exit_code: output.exit_code,
        duration_ms: millis(elapsed),
        test_results: None,
        verdict: None,
    }
}

/// Result of a single run that exceeded its deadline
pub fn single_run_timeout(seconds: u64, elapsed: Duration) -> ExecutionResult {
    ExecutionResult {
        stdout: String::new(),
        stderr: timeout_message(seconds),
        exit_code: -1,
        duration_ms: millis(elapsed),
        test_results: None,
        verdict: None,
    }
}

/// Result of a request whose container could not be set up or driven.
///
/// In test mode the result still carries an empty result list and a
/// `WRONG ANSWER` verdict.
pub fn setup_failure(
    error: &ContainerError,
    elapsed: Duration,
    test_mode: bool,
) -> ExecutionResult {
    ExecutionResult {
        stdout: String::new(),
        stderr: format!("Docker error: {error}"),
        exit_code: -1,
        duration_ms: millis(elapsed),
        test_results: test_mode.then(Vec::new),
        verdict: test_mode.then_some(Verdict::WrongAnswer),
    }
}

/// Human-readable summary of a test suite
pub fn transcript(verdict: Verdict, results: &[TestResult]) -> String {
    let passed = results.iter().filter(|r| r.passed).count();
    let mut lines = vec![
        format!("Verdict: {verdict}"),
        format!("Passed tests: {passed}/{}", results.len()),
        String::new(),
    ];
    lines.extend(results.iter().map(|r| {
        format!(
            "[{}] Test {}: {} (expected: {})",
            if r.passed { "PASS" } else { "FAIL" },
            r.index,
            r.actual_output,
            r.expected_output
        )
    }));
    lines.join("\n")
}

/// Accumulates test results of one batch run
#[derive(Debug, Default)]
pub struct SuiteReport {
    results: Vec<TestResult>,
    first_stderr: Option<String>,
}

impl SuiteReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Judge a test that ran to completion
    pub fn record(&mut self, test: &TestCase, output: &ProcessOutput, duration: Duration) {
        let actual = output.stdout.trim();
        let expected = test.expected_output.trim();
        let passed = output.exit_code == 0 && actual == expected;
        self.push(test, actual, &output.stderr, passed, output.exit_code, duration);
    }

    /// Record a test that exceeded its deadline
    pub fn record_timeout(&mut self, test: &TestCase, seconds: u64, duration: Duration) {
        self.push(test, "", &timeout_message(seconds), false, -1, duration);
    }

    /// Record a test that could not be run
    pub fn record_error(&mut self, test: &TestCase, error: &ContainerError, duration: Duration) {
        let message = format!("Docker error: {error}");
        self.push(test, "", &message, false, -1, duration);
    }

    /// Fail every test because the build step failed
    pub fn fail_build(&mut self, tests: &[TestCase], exit_code: i64, diagnostic: &str) {
        let diagnostic = diagnostic.trim();
        let note = inline_note("", &format!("Compilation failed\n{diagnostic}"));
        for test in tests {
            self.results.push(TestResult {
                index: self.results.len() + 1,
                input: test.input.clone(),
                expected_output: test.expected_output.trim().to_owned(),
                actual_output: note.clone(),
                passed: false,
                exit_code,
                duration_ms: 0,
            });
        }
        if self.first_stderr.is_none() && !diagnostic.is_empty() {
            self.first_stderr = Some(diagnostic.to_owned());
        }
    }

    fn push(
        &mut self,
        test: &TestCase,
        actual: &str,
        stderr: &str,
        passed: bool,
        exit_code: i64,
        duration: Duration,
    ) {
        let stderr = stderr.trim();
        if self.first_stderr.is_none() && !stderr.is_empty() {
            self.first_stderr = Some(stderr.to_owned());
        }

        self.results.push(TestResult {
            index: self.results.len() + 1,
            input: test.input.clone(),
            expected_output: test.expected_output.trim().to_owned(),
            actual_output: inline_note(actual, stderr),
            passed,
            exit_code,
            duration_ms: millis(duration),
        });
    }

    /// Assemble the request-level result
    pub fn finish(self, elapsed: Duration) -> ExecutionResult {
        let verdict = Verdict::from_results(&self.results);
        let accepted = verdict == Verdict::Accepted;
        let stderr = if accepted {
            String::new()
        } else {
            self.first_stderr.unwrap_or_default()
        };

        ExecutionResult {
            stdout: transcript(verdict, &self.results),
            stderr,
            exit_code: if accepted { 0 } else { 1 },
            duration_ms: millis(elapsed),
            test_results: Some(self.results),
            verdict: Some(verdict),
        }
    }
}

/// Diagnostic of a failed build: stderr, else stdout (tsc reports there)
pub fn build_diagnostic(output: &ProcessOutput) -> String {
    let stderr = output.stderr.trim();
    let stdout = output.stdout.trim();
    if !stderr.is_empty() {
        stderr.to_owned()
    } else if !stdout.is_empty() {
        stdout.to_owned()
    } else {
        format!("build exited with code {}", output.exit_code)
    }
}
