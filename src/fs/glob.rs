//! Glob expansion of source patterns into concrete file lists

use crate::pipeline::BuildError;
use async_trait::async_trait;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Ordered, duplicate-free list of file paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FileSet {
    paths: Vec<PathBuf>,
}

impl FileSet {
    /// Keeps the first occurrence of every path, in input order
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut seen = HashSet::new();
        let paths = paths
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .collect();
        Self { paths }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// Expands glob patterns into the files that currently match them
#[async_trait]
pub trait FileGlobber: Send + Sync {
    async fn glob(&self, patterns: &[String]) -> Result<FileSet, BuildError>;
}

/// [`FileGlobber`] backed by a directory walk under a fixed root
///
/// Relative patterns are anchored at the root; `**` crosses directories. The
/// walk ignores `.gitignore` rules, since dependency checkouts are usually
/// ignored by the project yet still compiled.
#[derive(Debug, Clone)]
pub struct GlobWalker {
    root: PathBuf,
}

impl GlobWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walker rooted at the process working directory
    pub fn current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Synchronous expansion; files matched by several patterns appear once
    pub fn expand(&self, patterns: &[String]) -> Result<FileSet, BuildError> {
        let mut matched = Vec::new();
        for pattern in patterns {
            let before = matched.len();
            self.expand_one(pattern, &mut matched)?;
            debug!(
                pattern = %pattern,
                matches = matched.len() - before,
                "Expanded source pattern"
            );
        }
        Ok(FileSet::from_paths(matched))
    }

    fn expand_one(&self, pattern: &str, matched: &mut Vec<PathBuf>) -> Result<(), BuildError> {
        let glob_error = |reason: String| BuildError::Glob {
            pattern: pattern.to_string(),
            reason,
        };

        let root = if Path::new(pattern).is_absolute() {
            PathBuf::from("/")
        } else {
            self.root.clone()
        };

        let mut builder = OverrideBuilder::new(&root);
        builder.add(pattern).map_err(|e| glob_error(e.to_string()))?;
        let overrides = builder.build().map_err(|e| glob_error(e.to_string()))?;

        let base = root.join(literal_prefix(pattern));
        if !base.exists() {
            return Ok(());
        }

        let mut files = Vec::new();
        for result in WalkBuilder::new(&base)
            .standard_filters(false)
            .follow_links(true)
            .build()
        {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file && overrides.matched(entry.path(), false).is_whitelist() {
                files.push(entry.into_path());
            }
        }

        files.sort();
        matched.extend(files);
        Ok(())
    }
}

#[async_trait]
impl FileGlobber for GlobWalker {
    async fn glob(&self, patterns: &[String]) -> Result<FileSet, BuildError> {
        let walker = self.clone();
        let patterns = patterns.to_vec();
        tokio::task::spawn_blocking(move || walker.expand(&patterns))
            .await
            .map_err(|e| BuildError::Glob {
                pattern: String::new(),
                reason: format!("directory walk did not finish: {}", e),
            })?
    }
}

/// Leading path components that contain no glob syntax
fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    let mut components = Path::new(pattern).components().peekable();
    while let Some(component) = components.next() {
        // The last component names files, never a directory to start from
        if components.peek().is_none() {
            break;
        }
        match component {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                if part.contains(&['*', '?', '[', '{'][..]) {
                    break;
                }
                prefix.push(part.as_ref());
            }
            Component::RootDir | Component::Prefix(_) => prefix.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => prefix.push(".."),
        }
    }
    prefix
}
