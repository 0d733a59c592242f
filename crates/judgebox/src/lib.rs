//! A library for running untrusted code under time and memory limits.
//!
//! judgebox compiles (when needed) and runs submitted programs as supervised
//! process groups, classifies every attempt into a small set of failures,
//! and judges submissions against ordered test cases.
//!
//! # Features
//!
//! - **Process-group supervision** — wall clock deadline, resident memory sampling and output caps, with the whole group killed on any breach.
//! - **Multi-language** — C++, Java and Python 3 toolchains configured as command templates.
//! - **Judge loop** — sequential test cases with early exit on the first failure or wrong answer.
//! - **Scoped artifacts** — per-job files named by UUID and removed exactly once.
//! - **TOML configuration** — work directory, compile limits, default limits and toolchains.
//!
//! This is not a kernel-level sandbox: there are no namespaces, seccomp
//! filters or cgroups.

pub use artifacts::{ArtifactError, ArtifactStore, JobArtifacts, SourceArtifact};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language, LanguageError, Toolchain};
pub use problem::{InMemoryProblems, Problem, ProblemDirectory, ProblemError, ProblemStore};
pub use runner::{Runner, judge_cases};
pub use service::{
    AuthStatus, RequestError, Response, RunRequest, RunResponse, Service, SubmitRequest,
    SubmitResponse,
};
pub use types::{
    ExecutionFailure, ExecutionRequest, ExecutionResult, JudgeVerdict, Outcome, ResourceLimits,
    TestCase, normalize_output,
};

pub mod artifacts;
pub mod config;
pub mod problem;
pub mod process;
pub mod runner;
pub mod service;
pub mod types;
