//! Module name extraction from source files

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Which of the two independent source namespaces a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// PureScript source
    Primary,
    /// JavaScript implementing foreign imports
    Foreign,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "src"),
            Self::Foreign => write!(f, "ffi"),
        }
    }
}

/// Reads the module name a source file declares
///
/// `Ok(None)` means the file declares no module and is skipped; `Err` means
/// the file could not be examined at all.
#[async_trait]
pub trait ModuleNameParser: Send + Sync {
    async fn module_name(&self, kind: SourceKind, path: &Path) -> Result<Option<String>>;
}

/// Header-based parser for `.purs` files and their foreign companions
///
/// Primary sources are named by their `module A.B.C` header. Foreign sources
/// are named by a `// module A.B.C` comment.
pub struct SourceModuleParser {
    primary: Regex,
    foreign: Regex,
}

impl SourceModuleParser {
    pub fn new() -> Self {
        Self {
            primary: Regex::new(r"(?m)^module\s+([A-Z][\w']*(?:\.[A-Z][\w']*)*)")
                .expect("valid regex"),
            foreign: Regex::new(r"(?m)^\s*//\s*module\s+([A-Z][\w']*(?:\.[A-Z][\w']*)*)")
                .expect("valid regex"),
        }
    }

    /// Extracts the module name from already-loaded source text
    pub fn name_from_source(&self, kind: SourceKind, source: &str) -> Option<String> {
        let pattern = match kind {
            SourceKind::Primary => &self.primary,
            SourceKind::Foreign => &self.foreign,
        };
        pattern
            .captures(source)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl Default for SourceModuleParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleNameParser for SourceModuleParser {
    async fn module_name(&self, kind: SourceKind, path: &Path) -> Result<Option<String>> {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(self.name_from_source(kind, &source))
    }
}
