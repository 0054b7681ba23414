//! Configuration management for psbuild
//!
//! Options can be built in code, read from a TOML file, and overridden from
//! environment variables. Every field has a default, so an empty file is a
//! valid configuration.
//!
//! # Recognized options
//!
//! - `src`: glob patterns for PureScript sources
//! - `ffi`: glob patterns for foreign JavaScript sources
//! - `output`: directory the compiler writes per-module artifacts to
//! - `bundleOutput`: file the final bundle is written to
//! - `bundleNamespace`: identifier the bundle groups its exports under
//! - `bundle`: whether the bundling step runs at all
//! - `compiler` / `bundler`: executables to invoke
//! - `requirePath`: relative require path passed to both tools
//! - `sourceExtension`: extension of module requests the host routes to us
//!
//! # Environment Variables
//!
//! - `PSBUILD_OUTPUT`: overrides `output`
//! - `PSBUILD_BUNDLE_OUTPUT`: overrides `bundleOutput`
//! - `PSBUILD_BUNDLE_NAMESPACE`: overrides `bundleNamespace`
//! - `PSBUILD_BUNDLE`: overrides `bundle` (true|false)
//!
//! # Example
//!
//! ```
//! use psbuild::BuildConfig;
//!
//! let config = BuildConfig::from_toml_str(r#"
//!     src = ["src/**/*.purs"]
//!     bundleNamespace = "App"
//! "#).unwrap();
//!
//! assert_eq!(config.bundle_namespace, "App");
//! assert_eq!(config.output.to_str(), Some("output"));
//! config.validate().unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_OUTPUT: &str = "output";
const DEFAULT_BUNDLE_FILE: &str = "bundle.js";
const DEFAULT_NAMESPACE: &str = "PS";
const DEFAULT_COMPILER: &str = "psc";
const DEFAULT_BUNDLER: &str = "psc-bundle";
const DEFAULT_REQUIRE_PATH: &str = "../";
const DEFAULT_SOURCE_EXTENSION: &str = "purs";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for this schema
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to parse an environment override
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Options for one orchestrator instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildConfig {
    /// Glob patterns for primary sources
    pub src: Vec<String>,

    /// Glob patterns for foreign sources
    pub ffi: Vec<String>,

    /// Directory for compiled per-module artifacts
    pub output: PathBuf,

    /// File path of the persisted bundle
    pub bundle_output: PathBuf,

    /// Identifier the bundle's exports are grouped under
    pub bundle_namespace: String,

    /// Run the bundling step after a successful compile
    pub bundle: bool,

    /// Compiler executable
    pub compiler: String,

    /// Bundler executable
    pub bundler: String,

    /// Relative require path handed to the compiler and bundler
    pub require_path: String,

    /// Extension (without the dot) of module requests handled by this instance
    pub source_extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src: default_patterns("purs"),
            ffi: default_patterns("js"),
            output: PathBuf::from(DEFAULT_OUTPUT),
            bundle_output: Path::new(DEFAULT_OUTPUT).join(DEFAULT_BUNDLE_FILE),
            bundle_namespace: DEFAULT_NAMESPACE.to_string(),
            bundle: true,
            compiler: DEFAULT_COMPILER.to_string(),
            bundler: DEFAULT_BUNDLER.to_string(),
            require_path: DEFAULT_REQUIRE_PATH.to_string(),
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
        }
    }
}

/// The project's own tree plus every `purescript-*` dependency checkout
fn default_patterns(extension: &str) -> Vec<String> {
    vec![
        format!("src/**/*.{}", extension),
        format!("bower_components/purescript-*/src/**/*.{}", extension),
    ]
}

impl BuildConfig {
    /// Parses a configuration from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Applies `PSBUILD_*` environment overrides on top of the current values
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(output) = env::var("PSBUILD_OUTPUT") {
            self.output = PathBuf::from(output);
        }
        if let Ok(bundle_output) = env::var("PSBUILD_BUNDLE_OUTPUT") {
            self.bundle_output = PathBuf::from(bundle_output);
        }
        if let Ok(namespace) = env::var("PSBUILD_BUNDLE_NAMESPACE") {
            self.bundle_namespace = namespace;
        }
        if let Ok(bundle) = env::var("PSBUILD_BUNDLE") {
            self.bundle = bundle
                .parse::<bool>()
                .map_err(|e| ConfigError::ParseError {
                    field: "PSBUILD_BUNDLE".to_string(),
                    error: e.to_string(),
                })?;
        }
        Ok(self)
    }

    /// Validates the configuration
    ///
    /// Checks that:
    /// - at least one source pattern is configured
    /// - the output directory is set
    /// - the namespace is a plain JavaScript identifier
    /// - a bundle path is set when bundling is enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.src.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "At least one src pattern is required".to_string(),
            ));
        }

        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Output directory must not be empty".to_string(),
            ));
        }

        if !is_identifier(&self.bundle_namespace) {
            return Err(ConfigError::ValidationFailed(format!(
                "Bundle namespace '{}' is not a valid identifier",
                self.bundle_namespace
            )));
        }

        if self.bundle && self.bundle_output.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "bundleOutput must be set when bundling is enabled".to_string(),
            ));
        }

        if self.source_extension.is_empty() || self.source_extension.starts_with('.') {
            return Err(ConfigError::ValidationFailed(format!(
                "Source extension '{}' must be non-empty and given without a leading dot",
                self.source_extension
            )));
        }

        Ok(())
    }

    /// Globs selecting the compiler's per-module artifacts, as passed to the bundler
    pub fn compiled_artifact_patterns(&self) -> Vec<String> {
        ["index.js", "foreign.js"]
            .iter()
            .map(|file| self.output.join("**").join(file).display().to_string())
            .collect()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
