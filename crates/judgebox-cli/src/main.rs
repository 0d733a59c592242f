//! judgebox CLI
//!
//! A command-line tool for running and judging code under time and memory
//! limits.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use judgebox::{
    AuthStatus, Config, EXAMPLE_CONFIG, InMemoryProblems, Language, ProblemDirectory,
    ResourceLimits, Runner, RunRequest, Service, SubmitRequest,
};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "judgebox")]
#[command(about = "A tool for running and judging untrusted code")]
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
        /// Output path (default: judgebox.toml)
        #[arg(short, long, default_value = "judgebox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a program once (compile if needed, then execute)
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language (cpp, java, python3)
        #[arg(short, long)]
        language: String,

        /// Input file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Time limit in milliseconds
        #[arg(short, long)]
        time_limit: Option<u64>,

        /// Memory limit in MB
        #[arg(short, long)]
        memory_limit: Option<u64>,
    },

    /// Judge a program against a stored problem
    Submit {
        /// Source file to judge
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language (cpp, java, python3)
        #[arg(short, long)]
        language: String,

        /// Directory holding <id>.toml or <id>.json problem files
        #[arg(long)]
        problems: PathBuf,

        /// Problem ID
        #[arg(long)]
        problem: String,
    },

    /// List available languages
    Languages,

    /// Show default configuration
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

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            source,
            language,
            input,
            time_limit,
            memory_limit,
        } => {
            run_program(
                config,
                &source,
                language,
                input.as_deref(),
                time_limit,
                memory_limit,
            )
            .await
        }
        Commands::Submit {
            source,
            language,
            problems,
            problem,
        } => submit_program(config, &source, language, problems, problem).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_program(
    config: Config,
    source: &Path,
    language: String,
    input: Option<&Path>,
    time_limit: Option<u64>,
    memory_limit: Option<u64>,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    let input = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .context("failed to read input file")?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read stdin")?;
            buf
        }
    };

    // Only explicitly given values override the configured defaults
    let limits = (time_limit.is_some() || memory_limit.is_some()).then_some(ResourceLimits {
        time_limit_ms: time_limit,
        memory_limit_mb: memory_limit,
    });

    info!(%language, "running program");

    let service = Service::new(Runner::new(config), InMemoryProblems::new());
    let response = service
        .run(
            AuthStatus::Authorized,
            RunRequest {
                language: Some(language),
                code: Some(code),
                input: Some(input),
                limits,
            },
        )
        .await;

    info!(status = response.status, "run finished");
    print_body(&response.body)?;

    if !response.body.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn submit_program(
    config: Config,
    source: &Path,
    language: String,
    problems: PathBuf,
    problem_id: String,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    info!(%language, problem = %problem_id, "judging submission");

    let service = Service::new(Runner::new(config), ProblemDirectory::new(problems));
    let response = service
        .submit(
            AuthStatus::Authorized,
            SubmitRequest {
                language: Some(language),
                code: Some(code),
                problem_id: Some(problem_id),
            },
        )
        .await;

    info!(status = response.status, verdict = ?response.body.verdict, "submission finished");
    print_body(&response.body)?;

    if !response.body.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Print a response body as JSON on stdout, keeping logs on stderr
fn print_body<T: Serialize>(body: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(body).context("failed to serialize response")?;
    println!("{json}");
    Ok(())
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    for language in Language::ALL {
        let toolchain = config.toolchain(language);
        let lang_type = if toolchain.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!(
            "  {:<15} {} ({}): {}",
            language.id(),
            language.display_name(),
            lang_type,
            toolchain.run.join(" ")
        );
    }
}

fn show_config(config: &Config) {
    println!("Default resource limits:");
    println!(
        "  Time limit: {} ms",
        config.default_limits.time_limit_ms()
    );
    println!(
        "  Memory limit: {} MB",
        config.default_limits.memory_limit_mb()
    );
    println!();
    println!("Compile timeout: {} ms", config.compile_timeout_ms);
    println!("Compile output limit: {} MB", config.compile_output_limit_mb);
    println!("Memory sample interval: {} ms", config.sample_interval_ms);
    println!("Work directory: {}", config.work_dir.display());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
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
