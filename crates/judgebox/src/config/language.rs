use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("Unsupported language: {0}")]
    Unsupported(String),
}

/// Languages accepted by the judge.
///
/// The set is closed: anything else is rejected when parsed, before a
/// toolchain is ever looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Language {
    /// Compiled to a native binary before running
    #[serde(rename = "cpp")]
    Cpp,

    /// Launched on the JVM straight from source
    #[serde(rename = "java")]
    Java,

    /// Run by the interpreter
    #[serde(rename = "python3")]
    Python3,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Cpp, Language::Java, Language::Python3];

    /// Canonical identifier, as used in configuration files
    pub fn id(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python3 => "python3",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Cpp => "C++",
            Language::Java => "Java",
            Language::Python3 => "Python3",
        }
    }

    /// File extension for source files, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python3 => "py",
        }
    }
}

impl FromStr for Language {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpp" | "c++" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            "python3" | "python" | "py" => Ok(Language::Python3),
            _ => Err(LanguageError::Unsupported(s.to_owned())),
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"one of \"cpp\", \"java\", \"python3\"",
            )
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
