use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A supported submission language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    TypeScript,
    Go,
    Java,
}

impl Language {
    /// Every registered language, in registry order
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::TypeScript,
        Language::Go,
        Language::Java,
    ];

    /// Identifier used on the wire and in configuration
    pub fn id(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
        }
    }

    /// Registry entry for this language
    pub fn profile(&self) -> &'static LanguageProfile {
        match self {
            Language::Python => &PYTHON,
            Language::TypeScript => &TYPESCRIPT,
            Language::Go => &GO,
            Language::Java => &JAVA,
        }
    }

    /// Whether a build step runs before the program
    pub fn is_compiled(&self) -> bool {
        !matches!(self, Language::Python)
    }

    /// Look up the language owning a file extension (without the dot)
    pub fn from_extension(extension: &str) -> Option<Language> {
        let extension = extension.to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.profile().extensions.contains(&extension.as_str()))
    }

    /// Detect the language of a file path from its extension
    pub fn detect(path: &str) -> Option<Language> {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Language::from_extension)
    }

    /// Check if a path carries one of this language's extensions
    pub fn matches(&self, path: &str) -> bool {
        Language::detect(path) == Some(*self)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.id() == needle)
            .ok_or_else(|| ConfigError::LanguageNotFound(s.to_owned()))
    }
}

/// How to run one supported language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    /// Human-readable name
    pub name: &'static str,

    /// Default container image
    pub image: &'static str,

    /// Canonical main-file name, used only as a naming hint
    pub main_file: &'static str,

    /// Extensions (without the dot) that identify this language
    pub extensions: &'static [&'static str],

    /// Command that pre-provisions the toolchain in the image
    pub setup_command: Option<&'static str>,

    /// Whether runs need outbound network access
    pub requires_network: bool,

    /// Extra environment for the container
    pub env: &'static [(&'static str, &'static str)],
}

static PYTHON: LanguageProfile = LanguageProfile {
    name: "Python 3.12",
    image: "python:3.12-slim",
    main_file: "main.py",
    extensions: &["py"],
    setup_command: None,
    requires_network: false,
    env: &[],
};

// `npx` fetches the compiler at run time, hence the network and a writable cache.
static TYPESCRIPT: LanguageProfile = LanguageProfile {
    name: "TypeScript (Node 20)",
    image: "node:20-slim",
    main_file: "main.ts",
    extensions: &["ts", "js"],
    setup_command: Some("npm install -g typescript ts-node"),
    requires_network: true,
    env: &[("NPM_CONFIG_CACHE", "/tmp/.npm")],
};

static GO: LanguageProfile = LanguageProfile {
    name: "Go 1.23",
    image: "golang:1.23-alpine",
    main_file: "main.go",
    extensions: &["go"],
    setup_command: None,
    requires_network: false,
    env: &[],
};

static JAVA: LanguageProfile = LanguageProfile {
    name: "Java 21 (OpenJDK)",
    image: "openjdk:21-jdk-slim",
    main_file: "Main.java",
    extensions: &["java"],
    setup_command: None,
    requires_network: false,
    env: &[],
};
