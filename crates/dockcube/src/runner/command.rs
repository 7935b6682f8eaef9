//! Shell command construction
//!
//! Commands are built from typed argv steps and rendered with POSIX single
//! quoting. Test input never appears in script text: it is passed base64
//! encoded as a positional parameter and decoded inside the container.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::config::Language;

/// Name of the Go binary produced by the batch build step
pub const GO_BINARY: &str = "main_bin";

const SHELL: &str = "/bin/sh";

/// `$0` of the test invocation script
const SCRIPT_NAME: &str = "dockcube";

const TSC_FLAGS: [&str; 6] = [
    "--target",
    "ES2020",
    "--module",
    "commonjs",
    "--esModuleInterop",
    "--skipLibCheck",
];

/// Quote `arg` for a POSIX shell
pub fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./:,+@%".contains(&b));
    if safe {
        return arg.to_owned();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// A sequence of argv steps joined with `&&`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellCommand {
    steps: Vec<Vec<String>>,
}

impl ShellCommand {
    pub fn new(argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::default().then(argv)
    }

    /// Append a step that runs only if the previous ones succeeded
    pub fn then(mut self, argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.steps.push(argv.into_iter().map(Into::into).collect());
        self
    }

    /// Append every step of `other`
    pub fn and(mut self, other: ShellCommand) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// Render as one shell line
    pub fn render(&self) -> String {
        self.steps
            .iter()
            .map(|argv| argv.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join(" && ")
    }

    /// Render as a grouped expression, safe to use inside a pipeline
    fn render_grouped(&self) -> String {
        if self.steps.len() > 1 {
            format!("{{ {}; }}", self.render())
        } else {
            self.render()
        }
    }

    /// argv that runs the line through `/bin/sh -c`
    pub fn into_argv(self) -> Vec<String> {
        vec![SHELL.to_owned(), "-c".to_owned(), self.render()]
    }
}

/// Program file and build inputs, relative to the container's working directory
#[derive(Debug, Clone, Copy)]
pub struct Program<'a> {
    pub language: Language,
    pub main_file: &'a str,
    /// Every `.ts` file of the workspace
    pub ts_files: &'a [String],
}

impl<'a> Program<'a> {
    pub fn new(language: Language, main_file: &'a str, ts_files: &'a [String]) -> Self {
        Self {
            language,
            main_file,
            ts_files,
        }
    }

    /// Command of a single-run container: build (if any) chained with run
    pub fn single_run(&self) -> ShellCommand {
        match self.language {
            Language::Python => ShellCommand::new(["python", self.main_file]),
            Language::TypeScript => match self.transpile() {
                Some(build) => build.and(self.runner()),
                None => self.runner(),
            },
            Language::Go => ShellCommand::new(["go", "run", self.main_file]),
            Language::Java => ShellCommand::new(["javac", self.main_file]).and(self.runner()),
        }
    }

    /// One-time build of a batch container, `None` when nothing is built
    pub fn build_step(&self) -> Option<ShellCommand> {
        match self.language {
            Language::Python => None,
            Language::TypeScript => self.transpile(),
            Language::Go => Some(ShellCommand::new([
                "go",
                "build",
                "-o",
                GO_BINARY,
                self.main_file,
            ])),
            Language::Java => Some(ShellCommand::new(["javac", self.main_file])),
        }
    }

    /// Reusable command running the built program once
    pub fn runner(&self) -> ShellCommand {
        match self.language {
            Language::Python => ShellCommand::new(["python", self.main_file]),
            Language::TypeScript => {
                ShellCommand::new(["node".to_owned(), js_output(self.main_file)])
            }
            Language::Go => ShellCommand::new([format!("./{GO_BINARY}")]),
            Language::Java => {
                let (classpath, class) = java_entry(self.main_file);
                ShellCommand::new(["java".to_owned(), "-cp".to_owned(), classpath, class])
            }
        }
    }

    fn transpile(&self) -> Option<ShellCommand> {
        if self.ts_files.is_empty() {
            return None;
        }
        let argv = ["npx", "-y", "tsc"]
            .into_iter()
            .chain(TSC_FLAGS)
            .map(str::to_owned)
            .chain(self.ts_files.iter().cloned());
        Some(ShellCommand::new(argv))
    }
}

/// Path of the JavaScript emitted for `main`
///
/// The `.ts` extension is matched case-insensitively, as in detection.
pub fn js_output(main: &str) -> String {
    let path = Path::new(main);
    let is_ts = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ts"));
    if is_ts {
        path.with_extension("js").to_string_lossy().into_owned()
    } else {
        main.to_owned()
    }
}

/// Classpath directory and class name of a Java main file
pub fn java_entry(main: &str) -> (String, String) {
    let path = Path::new(main);
    let classpath = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_owned());
    let class = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Main".to_owned());
    (classpath, class)
}

/// argv that feeds `input` to `runner`'s stdin.
///
/// The input travels base64 encoded as `$1` and is decoded in the container.
pub fn test_invocation(runner: &ShellCommand, input: &str) -> Vec<String> {
    let script = format!(
        "printf '%s' \"$1\" | base64 -d | {}",
        runner.render_grouped()
    );
    vec![
        SHELL.to_owned(),
        "-c".to_owned(),
        script,
        SCRIPT_NAME.to_owned(),
        STANDARD.encode(input),
    ]
}
