//! Run and submit request handlers
//!
//! Transport-agnostic: a handler takes an already-parsed request plus the
//! caller's authentication status and returns a status code with a
//! serializable body. Routing, token verification and persistence belong to
//! the embedding server.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::artifacts::{ArtifactError, SourceArtifact};
use crate::config::Language;
use crate::problem::{ProblemError, ProblemStore};
use crate::runner::Runner;
use crate::types::{JudgeVerdict, Outcome, ResourceLimits};

/// Outcome of token verification, decided by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Authorized,
    /// No token was presented
    Missing,
    Expired,
    /// Signature or payload did not verify
    Invalid,
}

/// Reasons a request is turned away before or around judging
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Code not found")]
    CodeNotFound,

    #[error("Input not found")]
    InputNotFound,

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Token expired!! Please log in again.")]
    TokenExpired,

    #[error("Token tampered")]
    TokenTampered,

    #[error("Unsupported language")]
    UnsupportedLanguage,

    #[error("Problem not found")]
    ProblemNotFound,

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Problem(ProblemError),
}

impl RequestError {
    pub fn http_status(&self) -> u16 {
        match self {
            RequestError::Unauthorized | RequestError::TokenExpired => 401,
            RequestError::Artifact(_) | RequestError::Problem(_) => 500,
            _ => 400,
        }
    }
}

impl From<ProblemError> for RequestError {
    fn from(e: ProblemError) -> Self {
        match e {
            // A malformed id cannot name a stored problem
            ProblemError::InvalidId(_) => RequestError::ProblemNotFound,
            other => RequestError::Problem(other),
        }
    }
}

/// Status code and body of a handled request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response<T> {
    pub status: u16,
    pub body: T,
}

/// Body of a run request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default, alias = "lang")]
    pub language: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default, alias = "manualTestCase")]
    pub input: Option<String>,

    /// Overrides for the configured default limits
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

/// Body of a submit request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default, alias = "lang")]
    pub language: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub problem_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_occ: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResponse {
    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            elapsed_time: None,
            memory_occ: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,

    /// Input of the case that stopped the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_test_case: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_occ: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            verdict: None,
            failed_test_case: None,
            elapsed_time: None,
            memory_occ: None,
            error: Some(message.into()),
        }
    }

    fn from_verdict(verdict: JudgeVerdict) -> Response<Self> {
        let status = match &verdict.outcome {
            Outcome::Accepted | Outcome::WrongAnswer => 200,
            Outcome::Failed(failure) => failure.http_status(),
        };
        let error = match &verdict.outcome {
            Outcome::Failed(failure) => Some(failure.to_string()),
            _ => None,
        };
        let body = Self {
            success: verdict.outcome.is_accepted(),
            verdict: Some(verdict.outcome.verdict_name().to_owned()),
            failed_test_case: verdict.failing_test_case.map(|case| case.input),
            elapsed_time: Some(verdict.total_elapsed_time_ms),
            memory_occ: Some(verdict.total_memory_used_mb),
            error,
        };
        Response { status, body }
    }
}

/// Request handlers over a runner and a problem store
#[derive(Debug, Clone)]
pub struct Service<S> {
    runner: Runner,
    problems: S,
}

impl<S: ProblemStore> Service<S> {
    pub fn new(runner: Runner, problems: S) -> Self {
        Self { runner, problems }
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    /// Run code once against a single input
    #[instrument(skip(self, request))]
    pub async fn run(&self, auth: AuthStatus, request: RunRequest) -> Response<RunResponse> {
        match self.try_run(auth, request).await {
            Ok(response) => response,
            Err(e) => {
                log_rejection(&e);
                Response {
                    status: e.http_status(),
                    body: RunResponse::error(e.to_string()),
                }
            }
        }
    }

    async fn try_run(
        &self,
        auth: AuthStatus,
        request: RunRequest,
    ) -> Result<Response<RunResponse>, RequestError> {
        let code = non_empty(request.code).ok_or(RequestError::CodeNotFound)?;
        let input = non_empty(request.input).ok_or(RequestError::InputNotFound)?;
        authorize(auth)?;
        let language = parse_language(request.language.as_deref())?;

        let limits = self.runner.config().effective_limits(request.limits.as_ref());
        let source = self.write_source(language, &code).await?;
        let attempt = self
            .runner
            .run(language, source.path(), input.as_bytes(), &limits)
            .await;
        source.release();

        let response = match attempt? {
            Ok(result) => Response {
                status: 200,
                body: RunResponse {
                    success: true,
                    output: Some(result.normalized_output),
                    elapsed_time: Some(result.elapsed_time_ms),
                    memory_occ: Some(result.memory_used_mb),
                    error: None,
                },
            },
            Err(failure) => Response {
                status: failure.http_status(),
                body: RunResponse::error(failure.to_string()),
            },
        };
        debug!(status = response.status, "run handled");
        Ok(response)
    }

    /// Judge code against every test case of a stored problem
    #[instrument(skip(self, request), fields(problem = ?request.problem_id))]
    pub async fn submit(&self, auth: AuthStatus, request: SubmitRequest) -> Response<SubmitResponse> {
        match self.try_submit(auth, request).await {
            Ok(response) => response,
            Err(e) => {
                log_rejection(&e);
                Response {
                    status: e.http_status(),
                    body: SubmitResponse::error(e.to_string()),
                }
            }
        }
    }

    async fn try_submit(
        &self,
        auth: AuthStatus,
        request: SubmitRequest,
    ) -> Result<Response<SubmitResponse>, RequestError> {
        let code = non_empty(request.code).ok_or(RequestError::CodeNotFound)?;
        authorize(auth)?;
        let language = parse_language(request.language.as_deref())?;

        let problem_id = request.problem_id.ok_or(RequestError::ProblemNotFound)?;
        let problem = self
            .problems
            .problem(&problem_id)?
            .ok_or(RequestError::ProblemNotFound)?;

        let source = self.write_source(language, &code).await?;
        let verdict = self
            .runner
            .judge(&problem, language, source.path(), None)
            .await;
        source.release();

        let response = SubmitResponse::from_verdict(verdict?);
        debug!(
            status = response.status,
            verdict = ?response.body.verdict,
            "submission judged"
        );
        Ok(response)
    }

    async fn write_source(
        &self,
        language: Language,
        code: &str,
    ) -> Result<SourceArtifact, RequestError> {
        Ok(self.runner.artifacts().write_source(language, code).await?)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn authorize(auth: AuthStatus) -> Result<(), RequestError> {
    match auth {
        AuthStatus::Authorized => Ok(()),
        AuthStatus::Missing => Err(RequestError::Unauthorized),
        AuthStatus::Expired => Err(RequestError::TokenExpired),
        AuthStatus::Invalid => Err(RequestError::TokenTampered),
    }
}

/// Parse the requested language, defaulting to C++
fn parse_language(language: Option<&str>) -> Result<Language, RequestError> {
    match language {
        None => Ok(Language::Cpp),
        Some(name) => name
            .parse()
            .map_err(|_| RequestError::UnsupportedLanguage),
    }
}

fn log_rejection(e: &RequestError) {
    match e {
        RequestError::Artifact(_) | RequestError::Problem(_) => {
            warn!(error = %e, "request failed");
        }
        _ => debug!(error = %e, "request rejected"),
    }
}
