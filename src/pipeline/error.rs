//! Errors raised while running a compile/bundle pass
//!
//! Every stage of the pipeline reports through [`BuildError`]. A single failure
//! is shared between all callers waiting on the same pass, so the orchestrator
//! hands it out as `Arc<BuildError>` rather than cloning it.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A module header that could not be read for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Errors that abort a pipeline run
#[derive(Debug, Error)]
pub enum BuildError {
    /// A file could not be stat'ed, read or written
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A glob pattern could not be compiled or walked
    #[error("Invalid source pattern '{pattern}': {reason}")]
    Glob { pattern: String, reason: String },

    /// One or more module names could not be extracted; the whole update is dropped
    #[error("Failed to read module names from {} file(s): {}", .0.len(), join_failures(.0))]
    Parse(Vec<ParseFailure>),

    /// An external tool could not be launched at all
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler exited with a nonzero status
    #[error("{stderr}")]
    Compiler { status: i32, stderr: String },

    /// The bundler exited with a nonzero status
    #[error("{stderr}")]
    Bundler { status: i32, stderr: String },

    /// None of the registered descriptors resolved to a module name
    #[error("No entry point module names found.")]
    NoEntryPoints,

    /// The dependency graph could not be derived from the bundle
    #[error("Failed to update dependency graph: {0}")]
    GraphUpdate(String),

    /// The pipeline task stopped before producing an outcome
    #[error("Build pass aborted: {0}")]
    Aborted(String),
}

fn join_failures(failures: &[ParseFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Diagnostic text captured from an external tool, if this error carries any
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Self::Compiler { stderr, .. } | Self::Bundler { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Short label of the failing stage, used in log fields
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Glob { .. } => "scan",
            Self::Parse(_) => "modules",
            Self::Spawn { .. } => "spawn",
            Self::Compiler { .. } => "compile",
            Self::Bundler { .. } | Self::NoEntryPoints => "bundle",
            Self::GraphUpdate(_) => "graph",
            Self::Aborted(_) => "pass",
        }
    }
}
