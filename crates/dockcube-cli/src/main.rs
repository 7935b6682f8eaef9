//! Dockcube Runner CLI
//!
//! A command-line tool for running code in Docker sandboxes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dockcube::{
    Config, EXAMPLE_CONFIG, ExecutionRequest, ExecutionResult, Language, Runner, TestCase,
};
use tokio::io::AsyncReadExt;
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dockcube")]
#[command(about = "A tool for running untrusted code in Docker containers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: dockcube.toml)
        #[arg(short, long, default_value = "dockcube.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run local source files (placed at the workspace root by file name)
    Run {
        /// Source files, the main file first
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Language ID (python, typescript, go, java); detected from extensions if omitted
        #[arg(short, long)]
        language: Option<String>,

        /// Deadline in seconds (per test in test mode)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// JSON file with test cases: [{"input": "...", "output": "..."}]
        #[arg(long, value_name = "JSON")]
        tests: Option<PathBuf>,
    },

    /// Execute a JSON request read from a file or stdin
    Exec {
        /// Request file (default: stdin)
        #[arg(value_name = "REQUEST")]
        request: Option<PathBuf>,
    },

    /// List available languages
    Languages,

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using default configuration");
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            files,
            language,
            timeout,
            tests,
        } => run_files(config, &files, language, timeout, tests.as_deref()).await,
        Commands::Exec { request } => exec_request(config, request.as_deref()).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => show_config(&config),
    }
}

async fn run_files(
    config: Config,
    files: &[PathBuf],
    language: Option<String>,
    timeout: Option<u64>,
    tests: Option<&Path>,
) -> Result<()> {
    let mut request = ExecutionRequest::new(language.unwrap_or_default())
        .with_timeout(timeout.unwrap_or(config.default_timeout));

    for (name, path) in workspace_names(files)? {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read source file {}", path.display()))?;
        request = request.with_file(name, content);
    }

    if let Some(tests_path) = tests {
        let content = tokio::fs::read_to_string(tests_path)
            .await
            .context("failed to read test cases")?;
        let cases: Vec<TestCase> =
            serde_json::from_str(&content).context("failed to parse test cases")?;
        request.test_cases = Some(cases);
    }

    let result = execute(config, &request).await?;
    print_result(&result)?;

    // Exit with the program's code, as a shell would report it
    if result.is_success() {
        Ok(())
    } else {
        std::process::exit(i32::try_from(result.exit_code).unwrap_or(1));
    }
}

/// Pair each source file with its workspace name (its base name)
fn workspace_names(files: &[PathBuf]) -> Result<Vec<(&str, &Path)>> {
    let mut seen = HashSet::new();
    let mut named = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("invalid file name: {}", path.display()))?;
        if !seen.insert(name) {
            anyhow::bail!(
                "duplicate file name '{name}': files are placed by base name, \
                 so '{}' would overwrite an earlier file",
                path.display()
            );
        }
        named.push((name, path.as_path()));
    }
    Ok(named)
}

async fn exec_request(config: Config, path: Option<&Path>) -> Result<()> {
    let content = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .context("failed to read request file")?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read request from stdin")?;
            buf
        }
    };

    let request: ExecutionRequest =
        serde_json::from_str(&content).context("failed to parse request")?;
    let result = execute(config, &request).await?;
    print_result(&result)
}

async fn execute(config: Config, request: &ExecutionRequest) -> Result<ExecutionResult> {
    let runner = Runner::connect(config).context("failed to connect to docker")?;

    info!(
        language = %request.language,
        files = request.files.len(),
        tests = request.tests().map_or(0, |t| t.len()),
        "executing request"
    );

    let result = runner
        .execute(request)
        .await
        .context("execution failed")?;

    info!(
        exit_code = result.exit_code,
        duration_ms = result.duration_ms,
        verdict = result.verdict.map(|v| v.as_str()),
        "execution result"
    );
    Ok(result)
}

fn print_result(result: &ExecutionResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("failed to serialize result")?;
    println!("{json}");
    Ok(())
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    for language in Language::ALL {
        let profile = language.profile();
        let kind = if language.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!("  {:<12} {} ({kind})", language.id(), profile.name);
        println!("  {:<12} image: {}", "", config.image_for(language));
        println!("  {:<12} main file: {}", "", profile.main_file);
        println!(
            "  {:<12} extensions: {}",
            "",
            profile
                .extensions
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "  {:<12} network: {}",
            "",
            if profile.requires_network { "yes" } else { "no" }
        );
        if let Some(setup) = profile.setup_command {
            println!("  {:<12} provisioning: {setup}", "");
        }
        println!();
    }
}

fn show_config(config: &Config) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("failed to serialize configuration")?;
    println!("{json}");
    Ok(())
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
