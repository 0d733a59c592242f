//! Compilation step for code execution
//!
//! Runs a toolchain's compile command with the configured compile deadline
//! and output cap. The compiler gets no memory ceiling.

use tracing::{debug, instrument};

use crate::config::Config;
use crate::process::{self, CommandSpec, Watch};
use crate::types::ExecutionFailure;

/// Watch applied to every compile command
pub(crate) fn compile_watch(config: &Config) -> Watch {
    Watch {
        deadline: config.compile_timeout(),
        memory_limit_bytes: None,
        output_limit_bytes: config.compile_output_limit_bytes(),
        sample_interval: config.sample_interval(),
    }
}

/// Compile a job's source.
///
/// Every way the compiler can fail is reported as
/// [`ExecutionFailure::CompileError`].
#[instrument(skip(config, command), fields(compiler = %command.program))]
pub(crate) async fn compile(config: &Config, command: &CommandSpec) -> Result<(), ExecutionFailure> {
    let watch = compile_watch(config);
    match process::run(command, &watch).await {
        Ok(output) => {
            debug!(elapsed_ms = output.elapsed_ms, "compilation complete");
            Ok(())
        }
        Err(failure) => {
            debug!(%failure, "compilation failed");
            Err(ExecutionFailure::CompileError {
                diagnostic: compile_diagnostic(failure, config),
            })
        }
    }
}

fn compile_diagnostic(failure: ExecutionFailure, config: &Config) -> String {
    match failure {
        ExecutionFailure::CompileError { diagnostic }
        | ExecutionFailure::RuntimeError { diagnostic } => diagnostic,
        ExecutionFailure::TimeExceeded => {
            format!("compilation timed out after {} ms", config.compile_timeout_ms)
        }
        ExecutionFailure::OutputTooLarge => format!(
            "compiler output exceeded {} MB",
            config.compile_output_limit_mb
        ),
        ExecutionFailure::MemoryExceeded => "compiler exceeded its memory limit".to_owned(),
    }
}
