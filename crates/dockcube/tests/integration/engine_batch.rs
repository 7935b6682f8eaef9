use dockcube::{ExecutionRequest, ProcessOutput, TestCase, Verdict};

use super::support::{Call, FakeRuntime, Failure, Reply, fake_runner, leftover_workspaces};

fn suite(language: &str, file: &str, tests: &[(&str, &str)]) -> ExecutionRequest {
    tests.iter().fold(
        ExecutionRequest::new(language).with_file(file, "source"),
        |request, (input, expected)| request.with_test_case(TestCase::new(*input, *expected)),
    )
}

fn echo_suite() -> ExecutionRequest {
    suite(
        "python",
        "main.py",
        &[("1\n", "1"), ("hello\n", "hello"), ("a b c\n", "a b c")],
    )
}

#[tokio::test]
async fn test_one_container_for_the_whole_suite() {
    let (runner, runtime, root) = fake_runner(FakeRuntime::new());

    let result = runner.execute(&echo_suite()).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::Accepted));
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.test_results.as_ref().map(Vec::len), Some(3));

    assert_eq!(runtime.creates(), 1);
    assert_eq!(runtime.uploads(), 1);
    assert_eq!(runtime.removes(), 1);
    assert_eq!(runtime.execs().len(), 3);
    assert_eq!(
        runtime.created_command().unwrap(),
        vec!["sleep".to_owned(), "3600".to_owned()]
    );
    assert_eq!(leftover_workspaces(&root), 0);
}

#[tokio::test]
async fn test_keepalive_covers_worst_case_suite() {
    let (runner, runtime, _root) = fake_runner(FakeRuntime::new());

    let inputs: Vec<String> = (0..13).map(|i| i.to_string()).collect();
    let pairs: Vec<(&str, &str)> = inputs.iter().map(|i| (i.as_str(), i.as_str())).collect();
    let request = suite("go", "main.go", &pairs).with_timeout(300);
    let result = runner.execute(&request).await.unwrap();
    assert_eq!(result.verdict, Some(Verdict::Accepted));

    let command = runtime.created_command().unwrap();
    assert_eq!(command[0], "sleep");
    let keepalive: u64 = command[1].parse().unwrap();
    // One build plus 13 tests, each allowed the full deadline
    assert!(keepalive >= 300 * 14);
}

#[tokio::test]
async fn test_accepted_suite_reports_transcript() {
    let (runner, _, _root) = fake_runner(FakeRuntime::new());

    let result = runner.execute(&echo_suite()).await.unwrap();

    assert_eq!(result.stderr, "");
    assert!(result.stdout.starts_with("Verdict: ACCEPTED\nPassed tests: 3/3\n"));
    assert!(result.stdout.contains("[PASS] Test 2: hello (expected: hello)"));

    let results = result.test_results.unwrap();
    for (i, test) in results.iter().enumerate() {
        assert_eq!(test.index, i + 1);
        assert!(test.passed);
        assert_eq!(test.exit_code, 0);
    }
    assert_eq!(results[0].input, "1\n");
    assert_eq!(results[0].actual_output, "1");
}

#[tokio::test]
async fn test_wrong_answer() {
    let (runner, _, _root) = fake_runner(FakeRuntime::new().respond(|input| {
        if input.starts_with("hello") {
            Reply::ok("goodbye\n")
        } else {
            Reply::ok(input)
        }
    }));

    let result = runner.execute(&echo_suite()).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::WrongAnswer));
    assert_eq!(result.exit_code, 1);
    assert!(result.stdout.contains("Passed tests: 2/3"));

    let results = result.test_results.unwrap();
    assert!(results[0].passed);
    assert!(!results[1].passed);
    assert_eq!(results[1].actual_output, "goodbye");
    assert!(results[2].passed);
}

#[tokio::test]
async fn test_non_zero_exit_fails_even_with_matching_output() {
    let (runner, _, _root) =
        fake_runner(FakeRuntime::new().respond(|input| Reply::fail(3, input, "")));

    let result = runner.execute(&echo_suite()).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::WrongAnswer));
    let results = result.test_results.unwrap();
    assert!(results.iter().all(|r| !r.passed && r.exit_code == 3));
}

#[tokio::test]
async fn test_first_stderr_becomes_request_stderr() {
    let (runner, _, _root) = fake_runner(FakeRuntime::new().respond(|input| match input {
        "1\n" => Reply::ok("1"),
        "hello\n" => Reply::fail(1, "partial", "ValueError: first"),
        _ => Reply::fail(1, "", "ValueError: second"),
    }));

    let result = runner.execute(&echo_suite()).await.unwrap();

    assert_eq!(result.stderr, "ValueError: first");
    let results = result.test_results.unwrap();
    assert_eq!(results[1].actual_output, "partial\nError: ValueError: first");
    assert_eq!(results[2].actual_output, "Error: ValueError: second");
}

#[tokio::test]
async fn test_stderr_hidden_when_accepted() {
    let (runner, _, _root) = fake_runner(FakeRuntime::new().respond(|input| {
        Reply::Exit(ProcessOutput::new(0, input, "DeprecationWarning"))
    }));

    let result = runner.execute(&echo_suite()).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::Accepted));
    assert_eq!(result.stderr, "");
}

#[tokio::test]
async fn test_hanging_test_only_fails_itself() {
    let (runner, runtime, _root) = fake_runner(FakeRuntime::new().respond(|input| {
        if input == "slow" {
            Reply::Hang
        } else {
            Reply::ok(input)
        }
    }));

    let request =
        suite("python", "main.py", &[("a", "a"), ("slow", "slow"), ("c", "c")]).with_timeout(1);
    let result = runner.execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::WrongAnswer));
    assert_eq!(result.stderr, "Execution timeout after 1 seconds");

    let results = result.test_results.unwrap();
    assert!(results[0].passed);
    assert!(!results[1].passed);
    assert_eq!(results[1].exit_code, -1);
    assert_eq!(
        results[1].actual_output,
        "Error: Execution timeout after 1 seconds"
    );
    assert!(results[2].passed);

    // Processes were killed, the container was kept for the remaining test
    assert_eq!(runtime.count(|c| matches!(c, Call::KillProcesses(_))), 1);
    assert_eq!(runtime.count(|c| matches!(c, Call::Kill(_))), 0);
    assert_eq!(runtime.creates(), 1);
    assert_eq!(runtime.removes(), 1);
}

#[tokio::test]
async fn test_input_reaches_program_verbatim() {
    let (runner, _, _root) = fake_runner(FakeRuntime::new());

    let hostile = "$(touch /tmp/pwned); echo 'quoted' \"double\" `tick`\n\\n";
    let request = suite("python", "main.py", &[(hostile, hostile.trim())]);
    let result = runner.execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::Accepted));
}

#[tokio::test]
async fn test_test_commands_pipe_input_to_runner() {
    let (runner, runtime, _root) = fake_runner(FakeRuntime::new());

    runner.execute(&echo_suite()).await.unwrap();

    for exec in runtime.execs() {
        assert_eq!(exec.len(), 5);
        assert_eq!(exec[0], "/bin/sh");
        assert_eq!(exec[1], "-c");
        assert_eq!(exec[2], "printf '%s' \"$1\" | base64 -d | python main.py");
    }
}

#[tokio::test]
async fn test_interpreted_language_has_no_build_step() {
    let (runner, runtime, _root) = fake_runner(FakeRuntime::new());

    runner.execute(&echo_suite()).await.unwrap();

    // Every exec is a test invocation carrying an encoded input
    assert!(runtime.execs().iter().all(|exec| exec.len() == 5));
}

#[tokio::test]
async fn test_go_builds_once_then_runs_binary() {
    let (runner, runtime, _root) = fake_runner(FakeRuntime::new());

    let request = suite("go", "main.go", &[("1", "1"), ("2", "2")]);
    let result = runner.execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::Accepted));

    let execs = runtime.execs();
    assert_eq!(execs.len(), 3);
    assert_eq!(
        execs[0],
        vec!["/bin/sh", "-c", "go build -o main_bin main.go"]
    );
    assert!(execs[1][2].ends_with("| ./main_bin"));
    assert!(execs[2][2].ends_with("| ./main_bin"));
}

#[tokio::test]
async fn test_typescript_transpiles_once() {
    let (runner, runtime, _root) = fake_runner(FakeRuntime::new());

    let request = suite("typescript", "main.ts", &[("x", "x")]);
    runner.execute(&request).await.unwrap();

    let execs = runtime.execs();
    assert_eq!(execs.len(), 2);
    assert!(execs[0][2].starts_with("npx -y tsc "));
    assert!(execs[1][2].ends_with("| node main.js"));
}

#[tokio::test]
async fn test_build_failure_fails_every_test_without_running_them() {
    let (runner, runtime, _root) = fake_runner(
        FakeRuntime::new().build(Reply::fail(1, "", "./main.go:3:1: syntax error")),
    );

    let request = suite("go", "main.go", &[("1", "1"), ("2", "2"), ("3", "3")]);
    let result = runner.execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::WrongAnswer));
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stderr, "./main.go:3:1: syntax error");

    let results = result.test_results.unwrap();
    assert_eq!(results.len(), 3);
    for test in &results {
        assert!(!test.passed);
        assert_eq!(test.exit_code, 1);
        assert_eq!(
            test.actual_output,
            "Error: Compilation failed\n./main.go:3:1: syntax error"
        );
    }

    // Only the build ran
    assert_eq!(runtime.execs().len(), 1);
    assert_eq!(runtime.removes(), 1);
}

#[tokio::test]
async fn test_typescript_build_diagnostic_from_stdout() {
    let (runner, _, _root) = fake_runner(FakeRuntime::new().build(Reply::fail(
        2,
        "main.ts(1,7): error TS2322",
        "",
    )));

    let request = suite("typescript", "main.ts", &[("x", "x")]);
    let result = runner.execute(&request).await.unwrap();

    assert_eq!(result.stderr, "main.ts(1,7): error TS2322");
    assert_eq!(result.test_results.unwrap()[0].exit_code, 2);
}

#[tokio::test]
async fn test_build_timeout_fails_every_test() {
    let (runner, runtime, _root) = fake_runner(FakeRuntime::new().build(Reply::Hang));

    let request = suite("java", "Main.java", &[("1", "1"), ("2", "2")]).with_timeout(1);
    let result = runner.execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::WrongAnswer));
    let results = result.test_results.unwrap();
    assert!(results.iter().all(|r| !r.passed && r.exit_code == -1));
    assert_eq!(runtime.count(|c| matches!(c, Call::KillProcesses(_))), 1);
    assert_eq!(runtime.removes(), 1);
}

#[tokio::test]
async fn test_setup_failure_in_test_mode() {
    let (runner, runtime, root) = fake_runner(FakeRuntime::new().fail_on(Failure::Start));

    let result = runner.execute(&echo_suite()).await.unwrap();

    assert_eq!(result.exit_code, -1);
    assert!(result.stderr.starts_with("Docker error:"));
    assert_eq!(result.test_results, Some(Vec::new()));
    assert_eq!(result.verdict, Some(Verdict::WrongAnswer));
    assert!(runtime.execs().is_empty());
    assert_eq!(runtime.removes(), 1);
    assert_eq!(leftover_workspaces(&root), 0);
}

#[tokio::test]
async fn test_create_failure_in_test_mode() {
    let (runner, runtime, _root) = fake_runner(FakeRuntime::new().fail_on(Failure::Create));

    let result = runner.execute(&echo_suite()).await.unwrap();

    assert_eq!(result.test_results, Some(Vec::new()));
    assert_eq!(result.verdict, Some(Verdict::WrongAnswer));
    assert_eq!(runtime.removes(), 0);
}

#[tokio::test]
async fn test_expected_output_is_trimmed() {
    let (runner, _, _root) = fake_runner(FakeRuntime::new().respond(|_| Reply::ok("42\n")));

    let request = suite("python", "main.py", &[("", "  42  \n")]);
    let result = runner.execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::Accepted));
    assert_eq!(result.test_results.unwrap()[0].expected_output, "42");
}
