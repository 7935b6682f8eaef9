use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default per-request deadline in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Resource caps applied to every container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in bytes
    #[serde(default = "default_memory")]
    pub memory: u64,

    /// CPU quota in microseconds per period
    #[serde(default = "default_cpu_quota")]
    pub cpu_quota: i64,

    /// CPU scheduling period in microseconds
    #[serde(default = "default_cpu_period")]
    pub cpu_period: i64,
}

impl ResourceLimits {
    /// 1 kibibyte in bytes
    pub const KB: u64 = 1024;
    /// 1 mebibyte in bytes
    pub const MB: u64 = 1024 * 1024;
    /// 1 gibibyte in bytes
    pub const GB: u64 = 1024 * 1024 * 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory limit in bytes
    pub fn with_memory(mut self, bytes: u64) -> Self {
        self.memory = bytes;
        self
    }

    /// Set the CPU quota and period in microseconds
    pub fn with_cpu(mut self, quota: i64, period: i64) -> Self {
        self.cpu_quota = quota;
        self.cpu_period = period;
        self
    }

    /// Fraction of one core the quota/period pair grants
    pub fn cpu_share(&self) -> f64 {
        if self.cpu_period <= 0 {
            return 0.0;
        }
        self.cpu_quota as f64 / self.cpu_period as f64
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory: default_memory(),
            cpu_quota: default_cpu_quota(),
            cpu_period: default_cpu_period(),
        }
    }
}

fn default_memory() -> u64 {
    512 * ResourceLimits::MB
}

fn default_cpu_quota() -> i64 {
    50_000
}

fn default_cpu_period() -> i64 {
    100_000
}

/// Source files of a submission, in the order they were supplied.
///
/// Serialized as a JSON object; deserialization keeps the key order of the
/// input document because language detection depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFiles(Vec<(String, String)>);

impl SourceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing the content of an existing path in place
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();
        match self.0.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = content,
            None => self.0.push((path, content)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(p, _)| p.as_str())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, c)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for SourceFiles {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut files = SourceFiles::new();
        for (path, content) in iter {
            files.insert(path, content);
        }
        files
    }
}

impl Serialize for SourceFiles {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (path, content) in &self.0 {
            map.serialize_entry(path, content)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SourceFiles {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FilesVisitor;

        impl<'de> Visitor<'de> for FilesVisitor {
            type Value = SourceFiles;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of file paths to file contents")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut files = SourceFiles::new();
                while let Some((path, content)) = access.next_entry::<String, String>()? {
                    files.insert(path, content);
                }
                Ok(files)
            }
        }

        deserializer.deserialize_map(FilesVisitor)
    }
}

/// A single input/expected-output pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: String,

    #[serde(rename = "output", default)]
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// A unit of work submitted for execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Declared language; file extensions take priority over it
    pub language: String,

    pub files: SourceFiles,

    /// Deadline in seconds, per run or per test
    #[serde(rename = "timeout", default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<Vec<TestCase>>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            files: SourceFiles::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            test_cases: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path, content);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_test_case(mut self, test: TestCase) -> Self {
        self.test_cases.get_or_insert_with(Vec::new).push(test);
        self
    }

    /// Test cases when the request runs in batch test-suite mode
    pub fn tests(&self) -> Option<&[TestCase]> {
        self.test_cases
            .as_deref()
            .filter(|tests| !tests.is_empty())
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Outcome of one test case in batch mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// 1-based position in the suite
    #[serde(rename = "test_index")]
    pub index: usize,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub exit_code: i64,
    pub duration_ms: u64,
}

/// Aggregate judgment over a test suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "ACCEPTED")]
    Accepted,

    #[serde(rename = "WRONG ANSWER")]
    WrongAnswer,
}

impl Verdict {
    /// Accepted iff every result passed
    pub fn from_results(results: &[TestResult]) -> Self {
        if results.iter().all(|r| r.passed) {
            Verdict::Accepted
        } else {
            Verdict::WrongAnswer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "ACCEPTED",
            Verdict::WrongAnswer => "WRONG ANSWER",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result envelope returned for every request that reaches the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub duration_ms: u64,
    pub test_results: Option<Vec<TestResult>>,
    pub verdict: Option<Verdict>,
}

impl ExecutionResult {
    /// Check if the run exited with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if the request ran in batch test-suite mode
    pub fn is_test_run(&self) -> bool {
        self.verdict.is_some()
    }
}
