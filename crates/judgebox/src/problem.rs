//! Problems and where they are stored
//!
//! A problem is an ordered list of test cases plus optional limits. The judge
//! only needs to look problems up by id, so storage sits behind the
//! [`ProblemStore`] trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::types::{ResourceLimits, TestCase};

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("invalid problem id: {0:?}")]
    InvalidId(String),

    #[error("failed to load problem {id}: {source}")]
    Load {
        id: String,
        #[source]
        source: config::ConfigError,
    },
}

/// A problem and its test cases, in the order they are judged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Wall clock limit per test case, in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    /// Memory limit per test case, in megabytes
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,

    #[serde(default, alias = "testcases")]
    pub test_cases: Vec<TestCase>,
}

impl Problem {
    pub fn new(id: impl Into<String>, test_cases: Vec<TestCase>) -> Self {
        Self {
            id: id.into(),
            title: None,
            time_limit_ms: None,
            memory_limit_mb: None,
            test_cases,
        }
    }

    /// Set the per-case limits
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.time_limit_ms = limits.time_limit_ms;
        self.memory_limit_mb = limits.memory_limit_mb;
        self
    }

    /// Limits declared by the problem; unset fields fall through to the
    /// configured defaults
    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            time_limit_ms: self.time_limit_ms,
            memory_limit_mb: self.memory_limit_mb,
        }
    }
}

/// Lookup of problems by id
pub trait ProblemStore {
    /// Find a problem. `Ok(None)` means no problem has this id.
    fn problem(&self, id: &str) -> Result<Option<Problem>, ProblemError>;
}

impl<S: ProblemStore + ?Sized> ProblemStore for &S {
    fn problem(&self, id: &str) -> Result<Option<Problem>, ProblemError> {
        (**self).problem(id)
    }
}

impl<S: ProblemStore + ?Sized> ProblemStore for std::sync::Arc<S> {
    fn problem(&self, id: &str) -> Result<Option<Problem>, ProblemError> {
        (**self).problem(id)
    }
}

/// Problems held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryProblems {
    problems: HashMap<String, Problem>,
}

impl InMemoryProblems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a problem, replacing any with the same id
    pub fn insert(&mut self, problem: Problem) {
        self.problems.insert(problem.id.clone(), problem);
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

impl FromIterator<Problem> for InMemoryProblems {
    fn from_iter<I: IntoIterator<Item = Problem>>(iter: I) -> Self {
        let mut store = Self::new();
        for problem in iter {
            store.insert(problem);
        }
        store
    }
}

impl ProblemStore for InMemoryProblems {
    fn problem(&self, id: &str) -> Result<Option<Problem>, ProblemError> {
        Ok(self.problems.get(id).cloned())
    }
}

/// Problems stored as `<dir>/<id>.toml` or `<dir>/<id>.json`
#[derive(Debug, Clone)]
pub struct ProblemDirectory {
    dir: PathBuf,
}

impl ProblemDirectory {
    const EXTENSIONS: [&'static str; 2] = ["toml", "json"];

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(&self, id: &str, path: &Path) -> Result<Problem, ProblemError> {
        let load_error = |source| ProblemError::Load {
            id: id.to_owned(),
            source,
        };
        let mut problem: Problem = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(load_error)?;

        if problem.id.is_empty() {
            problem.id = id.to_owned();
        }
        Ok(problem)
    }
}

impl ProblemStore for ProblemDirectory {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn problem(&self, id: &str) -> Result<Option<Problem>, ProblemError> {
        validate_id(id)?;

        for ext in Self::EXTENSIONS {
            let path = self.dir.join(format!("{id}.{ext}"));
            if path.is_file() {
                let problem = self.load(id, &path)?;
                debug!(path = %path.display(), cases = problem.test_cases.len(), "loaded problem");
                return Ok(Some(problem));
            }
        }
        Ok(None)
    }
}

/// Reject ids that could name a file outside the problem directory
fn validate_id(id: &str) -> Result<(), ProblemError> {
    let invalid = id.is_empty()
        || id.starts_with('.')
        || id.contains("..")
        || id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ProblemError::InvalidId(id.to_owned()));
    }
    Ok(())
}
