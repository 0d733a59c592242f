//! Execution step for code running
//!
//! Resolves the toolchain for a request, compiles when the language needs
//! it, then runs the program against the job's input file.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::artifacts::JobArtifacts;
use crate::config::{Config, Language};
use crate::process::{self, Watch};
use crate::runner::compile;
use crate::types::{ExecutionFailure, ExecutionRequest, ExecutionResult, MB, normalize_output};

/// Watch applied to a program run
pub(crate) fn run_watch(config: &Config, time_limit_ms: u64, memory_limit_mb: u64) -> Watch {
    let memory_limit_bytes = memory_limit_mb.saturating_mul(MB);
    Watch {
        deadline: Duration::from_millis(time_limit_ms),
        memory_limit_bytes: Some(memory_limit_bytes),
        // Captured output counts against the same budget as resident memory.
        output_limit_bytes: memory_limit_bytes,
        sample_interval: config.sample_interval(),
    }
}

/// Execute one request and release its artifacts.
#[instrument(skip(config, request), fields(language = %request.language(), job = %request.job_id()))]
pub(crate) async fn execute(
    config: &Config,
    request: ExecutionRequest,
) -> Result<ExecutionResult, ExecutionFailure> {
    let (job, language, source_path, time_limit_ms, memory_limit_mb) = request.into_parts();

    let result = run_job(config, &job, language, &source_path, time_limit_ms, memory_limit_mb).await;

    // Every process of the job is gone by now.
    job.release();

    match &result {
        Ok(r) => debug!(
            elapsed_ms = r.elapsed_time_ms,
            memory_mb = r.memory_used_mb,
            "execution complete"
        ),
        Err(failure) => debug!(%failure, "execution failed"),
    }
    result
}

async fn run_job(
    config: &Config,
    job: &JobArtifacts,
    language: Language,
    source_path: &Path,
    time_limit_ms: u64,
    memory_limit_mb: u64,
) -> Result<ExecutionResult, ExecutionFailure> {
    let commands = config
        .toolchain(language)
        .resolve(source_path, job.binary_path(), job.input_path())
        .map_err(|e| ExecutionFailure::RuntimeError {
            diagnostic: e.to_string(),
        })?;

    if let Some(ref compile_command) = commands.compile {
        compile::compile(config, compile_command).await?;
    }

    let watch = run_watch(config, time_limit_ms, memory_limit_mb);
    let output = process::run(&commands.run, &watch).await?;

    Ok(ExecutionResult {
        normalized_output: normalize_output(&String::from_utf8_lossy(&output.stdout)),
        elapsed_time_ms: output.elapsed_ms,
        memory_used_mb: output.memory_bytes as f64 / MB as f64,
    })
}
