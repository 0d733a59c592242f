use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::artifacts::JobArtifacts;
use crate::config::Language;

/// Default wall-clock limit for a run, in milliseconds
pub const DEFAULT_TIME_LIMIT_MS: u64 = 4000;

/// Default memory ceiling for a run, in megabytes
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 64;

/// 1 megabyte in bytes
pub const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall clock time limit in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    /// Memory limit in megabytes
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
}

impl ResourceLimits {
    /// Create new resource limits with the default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits with every field unset, for use as an override layer
    pub fn unset() -> Self {
        Self {
            time_limit_ms: None,
            memory_limit_mb: None,
        }
    }

    /// Set the wall clock time limit in milliseconds
    pub fn with_time_limit(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Set the memory limit in megabytes
    pub fn with_memory_limit(mut self, mb: u64) -> Self {
        self.memory_limit_mb = Some(mb);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            time_limit_ms: overrides.time_limit_ms.or(self.time_limit_ms),
            memory_limit_mb: overrides.memory_limit_mb.or(self.memory_limit_mb),
        }
    }

    /// Time limit, falling back to [`DEFAULT_TIME_LIMIT_MS`]
    pub fn time_limit_ms(&self) -> u64 {
        self.time_limit_ms.unwrap_or(DEFAULT_TIME_LIMIT_MS)
    }

    /// Memory limit, falling back to [`DEFAULT_MEMORY_LIMIT_MB`]
    pub fn memory_limit_mb(&self) -> u64 {
        self.memory_limit_mb.unwrap_or(DEFAULT_MEMORY_LIMIT_MB)
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit_ms: Some(DEFAULT_TIME_LIMIT_MS),
            memory_limit_mb: Some(DEFAULT_MEMORY_LIMIT_MB),
        }
    }
}

/// One compile-and-run attempt.
///
/// The request owns the job's artifacts, so handing it to
/// [`Runner::execute`](crate::Runner::execute) also hands over the
/// responsibility for removing them.
#[derive(Debug)]
pub struct ExecutionRequest {
    language: Language,
    source_path: PathBuf,
    job: JobArtifacts,
    time_limit_ms: u64,
    memory_limit_mb: u64,
}

impl ExecutionRequest {
    pub fn new(
        language: Language,
        source_path: impl Into<PathBuf>,
        job: JobArtifacts,
        limits: &ResourceLimits,
    ) -> Self {
        Self {
            language,
            source_path: source_path.into(),
            job,
            time_limit_ms: limits.time_limit_ms(),
            memory_limit_mb: limits.memory_limit_mb(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn input_path(&self) -> &Path {
        self.job.input_path()
    }

    /// Identifier of the job's artifacts
    pub fn job_id(&self) -> Uuid {
        self.job.id()
    }

    pub fn time_limit_ms(&self) -> u64 {
        self.time_limit_ms
    }

    pub fn memory_limit_mb(&self) -> u64 {
        self.memory_limit_mb
    }

    pub(crate) fn into_parts(self) -> (JobArtifacts, Language, PathBuf, u64, u64) {
        (
            self.job,
            self.language,
            self.source_path,
            self.time_limit_ms,
            self.memory_limit_mb,
        )
    }
}

/// Result of a run that stayed within its limits
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Standard output after [`normalize_output`]
    pub normalized_output: String,

    /// Wall clock time from spawn to exit, in milliseconds
    pub elapsed_time_ms: f64,

    /// Last in-limit resident memory sample, in megabytes
    pub memory_used_mb: f64,
}

/// Why an attempt did not produce an [`ExecutionResult`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailure {
    #[error("Compilation error: {diagnostic}")]
    CompileError { diagnostic: String },

    #[error("Runtime error: {diagnostic}")]
    RuntimeError { diagnostic: String },

    #[error("Execution time exceeded the limit")]
    TimeExceeded,

    #[error("Memory limit exceeded")]
    MemoryExceeded,

    #[error("Output limit exceeded")]
    OutputTooLarge,
}

impl ExecutionFailure {
    /// Verdict name shown to users
    pub fn verdict_name(&self) -> &'static str {
        match self {
            ExecutionFailure::CompileError { .. } => "Compilation Error",
            ExecutionFailure::RuntimeError { .. } => "Runtime Error",
            ExecutionFailure::TimeExceeded => "Time Limit Exceeded",
            ExecutionFailure::MemoryExceeded => "Memory Limit Exceeded",
            ExecutionFailure::OutputTooLarge => "Output Limit Exceeded",
        }
    }

    /// HTTP-style status code for request handlers
    pub fn http_status(&self) -> u16 {
        match self {
            ExecutionFailure::CompileError { .. } | ExecutionFailure::RuntimeError { .. } => 400,
            ExecutionFailure::TimeExceeded => 408,
            ExecutionFailure::MemoryExceeded | ExecutionFailure::OutputTooLarge => 413,
        }
    }
}

/// A stored (input, expected output) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(alias = "testinput")]
    pub input: String,

    #[serde(alias = "testoutput")]
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

/// Final classification of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    WrongAnswer,
    Failed(ExecutionFailure),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    /// Verdict name shown to users
    pub fn verdict_name(&self) -> &'static str {
        match self {
            Outcome::Accepted => "Accepted",
            Outcome::WrongAnswer => "Wrong Answer",
            Outcome::Failed(failure) => failure.verdict_name(),
        }
    }
}

/// Terminal result of a judge run
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub outcome: Outcome,

    /// The case that stopped the run, if any
    pub failing_test_case: Option<TestCase>,

    /// Sum of elapsed time over the cases that passed
    pub total_elapsed_time_ms: f64,

    /// Sum of memory usage over the cases that passed
    pub total_memory_used_mb: f64,
}

/// Canonicalize program output for comparison.
///
/// Every `\r\n` and lone `\r` becomes `\n`, then surrounding whitespace is
/// trimmed. Expected output goes through the same function.
pub fn normalize_output(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_owned()
}
