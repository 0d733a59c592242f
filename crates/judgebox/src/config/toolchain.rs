use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Language};
use crate::process::CommandSpec;

/// How to build and start programs written in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Compile command and arguments with placeholders (None when the
    /// language runs from source). Placeholders: {source}, {binary}
    #[serde(default)]
    pub compile: Option<Vec<String>>,

    /// Run command and arguments with placeholders.
    /// Placeholders: {source}, {binary}
    pub run: Vec<String>,

    /// Environment variables set for both steps
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Commands for one job, with every placeholder expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommands {
    pub compile: Option<CommandSpec>,
    pub run: CommandSpec,
}

impl Toolchain {
    fn from_templates(compile: Option<&[&str]>, run: &[&str]) -> Self {
        let owned = |args: &[&str]| args.iter().map(|s| (*s).to_owned()).collect();
        Self {
            compile: compile.map(owned),
            run: owned(run),
            env: HashMap::new(),
        }
    }

    pub fn default_cpp() -> Self {
        Self::from_templates(Some(&["g++", "{source}", "-o", "{binary}"]), &["{binary}"])
    }

    pub fn default_java() -> Self {
        Self::from_templates(None, &["java", "{source}"])
    }

    pub fn default_python3() -> Self {
        Self::from_templates(None, &["python3", "{source}"])
    }

    /// Check if the toolchain has a separate compile step
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Expand the templates for one job.
    ///
    /// The run command reads its standard input from `input`; the compile
    /// command gets none.
    pub fn resolve(
        &self,
        source: &Path,
        binary: &Path,
        input: &Path,
    ) -> Result<ResolvedCommands, ConfigError> {
        let source = source.to_string_lossy();
        let binary = binary.to_string_lossy();

        let compile = match &self.compile {
            Some(template) => Some(
                CommandSpec::from_argv(expand_command(template, &source, &binary))
                    .ok_or_else(|| ConfigError::Invalid("empty compile command".to_owned()))?
                    .envs(&self.env),
            ),
            None => None,
        };
        let run = CommandSpec::from_argv(expand_command(&self.run, &source, &binary))
            .ok_or_else(|| ConfigError::Invalid("empty run command".to_owned()))?
            .envs(&self.env)
            .stdin(input);

        Ok(ResolvedCommands { compile, run })
    }
}

/// Expand placeholders in the given command
pub fn expand_command(command: &[String], source: &str, binary: &str) -> Vec<String> {
    command
        .iter()
        .map(|arg| {
            arg.replace("{source}", source)
                .replace("{binary}", binary)
        })
        .collect()
}

/// One toolchain per supported language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchains {
    #[serde(default = "Toolchain::default_cpp")]
    pub cpp: Toolchain,

    #[serde(default = "Toolchain::default_java")]
    pub java: Toolchain,

    #[serde(default = "Toolchain::default_python3")]
    pub python3: Toolchain,
}

impl Toolchains {
    pub fn get(&self, language: Language) -> &Toolchain {
        match language {
            Language::Cpp => &self.cpp,
            Language::Java => &self.java,
            Language::Python3 => &self.python3,
        }
    }
}

impl Default for Toolchains {
    fn default() -> Self {
        Self {
            cpp: Toolchain::default_cpp(),
            java: Toolchain::default_java(),
            python3: Toolchain::default_python3(),
        }
    }
}
