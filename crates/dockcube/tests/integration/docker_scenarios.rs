//! End-to-end runs against a real Docker daemon

use dockcube::{Config, ExecutionRequest, Runner, TestCase, Verdict};

fn runner() -> Runner {
    Runner::connect(Config::default()).expect("failed to connect to docker")
}

fn echo_program() -> ExecutionRequest {
    ExecutionRequest::new("python").with_file("main.py", "print(input())")
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_python_single_run() {
    let request = ExecutionRequest::new("python").with_file("main.py", "print(1+1)");
    let result = runner().execute(&request).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout.trim(), "2");
    assert_eq!(result.stderr, "");
    assert!(result.verdict.is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_echo_suite_accepted() {
    let request = echo_program()
        .with_test_case(TestCase::new("hello\n", "hello"))
        .with_test_case(TestCase::new("42\n", "42"));
    let result = runner().execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::Accepted));
    assert_eq!(result.exit_code, 0);
    assert!(result.test_results.unwrap().iter().all(|r| r.passed));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_wrong_answer() {
    let request = echo_program().with_test_case(TestCase::new("hello\n", "goodbye"));
    let result = runner().execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::WrongAnswer));
    assert_eq!(result.exit_code, 1);
    let results = result.test_results.unwrap();
    assert_eq!(results[0].actual_output, "hello");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_timeout() {
    let request = ExecutionRequest::new("python")
        .with_file("main.py", "import time\ntime.sleep(5)")
        .with_timeout(1);
    let result = runner().execute(&request).await.unwrap();

    assert_eq!(result.exit_code, -1);
    assert_eq!(result.stderr, "Execution timeout after 1 seconds");
    assert!(result.duration_ms >= 1000);
    assert!(result.duration_ms < 4000);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_go_suite_builds_once() {
    let source = r#"package main

import "fmt"

func main() {
    var n int
    fmt.Scan(&n)
    fmt.Println(n * 2)
}
"#;
    let request = ExecutionRequest::new("go")
        .with_file("main.go", source)
        .with_timeout(60)
        .with_test_case(TestCase::new("2", "4"))
        .with_test_case(TestCase::new("21", "42"));
    let result = runner().execute(&request).await.unwrap();

    assert_eq!(result.verdict, Some(Verdict::Accepted));
}
