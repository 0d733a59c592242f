use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::language::{Language, LanguageError};
pub use crate::config::toolchain::{ResolvedCommands, Toolchain, Toolchains, expand_command};
use crate::types::{MB, ResourceLimits};

pub mod language;
mod loader;
pub mod toolchain;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../judgebox.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for judgebox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared directory for per-job source, input and binary files
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Wall clock deadline for the compile step, in milliseconds
    #[serde(default = "default_compile_timeout_ms")]
    pub compile_timeout_ms: u64,

    /// Cap on compiler stdout/stderr, in megabytes
    #[serde(default = "default_compile_output_limit_mb")]
    pub compile_output_limit_mb: u64,

    /// Memory sampler period, in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Default resource limits applied to all executions.
    /// Problem limits and request overrides take precedence.
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Toolchain per language
    #[serde(default)]
    pub toolchains: Toolchains,
}

impl Config {
    /// Create a new config from the embedded example
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the toolchain for a language
    pub fn toolchain(&self, language: Language) -> &Toolchain {
        self.toolchains.get(language)
    }

    /// Merge resource limits with defaults
    pub fn effective_limits(&self, overrides: Option<&ResourceLimits>) -> ResourceLimits {
        match overrides {
            Some(limits) => self.default_limits.with_overrides(limits),
            None => self.default_limits,
        }
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    pub fn compile_output_limit_bytes(&self) -> u64 {
        self.compile_output_limit_mb.saturating_mul(MB)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("judgebox")
}

fn default_compile_timeout_ms() -> u64 {
    10_000
}

fn default_compile_output_limit_mb() -> u64 {
    16
}

fn default_sample_interval_ms() -> u64 {
    100
}
