//! Code runner for judgebox
//!
//! Provides high-level APIs for compiling, running and judging code under
//! time and memory limits.

use std::path::Path;

use tracing::instrument;

pub use crate::runner::judge::judge_cases;

mod compile;
mod execute;
mod judge;

use crate::{
    artifacts::{ArtifactError, ArtifactStore},
    config::{Config, Language},
    problem::Problem,
    types::{ExecutionFailure, ExecutionRequest, ExecutionResult, JudgeVerdict, ResourceLimits},
};

/// High-level runner for code execution
///
/// Cloning is cheap enough to hand one runner to every task; concurrent jobs
/// never share files.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Config,
    artifacts: ArtifactStore,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        let artifacts = ArtifactStore::new(&config.work_dir);
        Self { config, artifacts }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the artifact store backing the work directory
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Compile (when needed) and run one request.
    ///
    /// The request's artifacts are released before this returns, whatever
    /// the outcome.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<ExecutionResult, ExecutionFailure> {
        execute::execute(&self.config, request).await
    }

    /// Allocate a job for `input` and execute `source_path` against it.
    ///
    /// Only failing to set up the job is an error; the attempt's own
    /// classification is the inner result.
    pub async fn run(
        &self,
        language: Language,
        source_path: &Path,
        input: &[u8],
        limits: &ResourceLimits,
    ) -> Result<Result<ExecutionResult, ExecutionFailure>, ArtifactError> {
        let job = self.artifacts.allocate(input).await?;
        let request = ExecutionRequest::new(language, source_path, job, limits);
        Ok(self.execute(request).await)
    }

    /// Judge a source file against every test case of a problem.
    ///
    /// Limits layer as config defaults, then the problem's own limits, then
    /// `overrides`.
    #[instrument(skip(self, problem, overrides), fields(problem = %problem.id))]
    pub async fn judge(
        &self,
        problem: &Problem,
        language: Language,
        source_path: &Path,
        overrides: Option<&ResourceLimits>,
    ) -> Result<JudgeVerdict, ArtifactError> {
        let mut limits = self.config.effective_limits(Some(&problem.limits()));
        if let Some(overrides) = overrides {
            limits = limits.with_overrides(overrides);
        }

        judge_cases(&problem.test_cases, move |case| {
            let input = case.input.clone();
            async move { self.run(language, source_path, input.as_bytes(), &limits).await }
        })
        .await
    }
}
