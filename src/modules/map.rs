//! Incremental module name to source path resolution

use super::parser::{ModuleNameParser, SourceKind};
use crate::fs::{FileSet, ModificationMap};
use crate::pipeline::error::{BuildError, ParseFailure};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Module name to the file that declares it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ModuleMap {
    entries: BTreeMap<String, PathBuf>,
}

impl ModuleMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, module: &str) -> Option<&Path> {
        self.entries.get(module).map(PathBuf::as_path)
    }

    /// Name of the module declared by `path`, if any
    pub fn module_for(&self, path: &Path) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, p)| p.as_path() == path)
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PathBuf)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PathBuf)> for ModuleMap {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Builds the module map for the current scan from the previous one.
///
/// Only files that were added or changed between `old_modifications` and
/// `new_modifications` are parsed, in file-set order. Entries for unchanged
/// files are carried over untouched; entries for removed or changed files are
/// dropped before the re-parsed names are inserted. A file that declares no
/// module contributes nothing. If any file cannot be parsed the whole update
/// fails and the caller keeps `old_map`.
pub async fn update_sources(
    parser: &dyn ModuleNameParser,
    kind: SourceKind,
    files: &FileSet,
    old_map: &ModuleMap,
    old_modifications: &ModificationMap,
    new_modifications: &ModificationMap,
) -> Result<ModuleMap, BuildError> {
    let diff = ModificationMap::diff(old_modifications, new_modifications);
    let unchanged: HashSet<&PathBuf> = diff.unchanged.iter().collect();
    let dirty: HashSet<&PathBuf> = diff.dirty().collect();

    let mut entries: BTreeMap<String, PathBuf> = old_map
        .entries
        .iter()
        .filter(|(_, path)| unchanged.contains(path))
        .map(|(name, path)| (name.clone(), path.clone()))
        .collect();
    let carried = entries.len();

    let to_parse: Vec<&PathBuf> = files.iter().filter(|path| dirty.contains(path)).collect();
    let parsed = join_all(
        to_parse
            .iter()
            .map(|path| parser.module_name(kind, path.as_path())),
    )
    .await;

    let mut failures = Vec::new();
    let mut unnamed = 0usize;
    for (path, result) in to_parse.iter().zip(parsed) {
        match result {
            Ok(Some(name)) => {
                entries.insert(name, (*path).clone());
            }
            Ok(None) => unnamed += 1,
            Err(e) => failures.push(ParseFailure {
                path: (*path).clone(),
                reason: format!("{:#}", e),
            }),
        }
    }

    if !failures.is_empty() {
        return Err(BuildError::Parse(failures));
    }

    debug!(
        kind = %kind,
        carried,
        parsed = to_parse.len(),
        unnamed,
        removed = diff.removed.len(),
        "Updated module map"
    );

    Ok(ModuleMap { entries })
}
