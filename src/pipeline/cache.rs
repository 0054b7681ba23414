//! Cross-pass cache of file stamps, module maps and the dependency graph
//!
//! A [`Cache`] is never edited in place once published. Each successful pass
//! derives a new value from the previous one with [`Cache::updated`], and the
//! orchestrator swaps it in as a whole.

use super::error::BuildError;
use crate::config::BuildConfig;
use crate::fs::{FileGlobber, FileSet, ModificationMap};
use crate::modules::{update_sources, DependencyGraph, ModuleMap, ModuleNameParser, SourceKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Everything a pass learns about the sources and the last bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cache {
    pub src_files: FileSet,
    pub ffi_files: FileSet,
    pub src_modification_map: ModificationMap,
    pub ffi_modification_map: ModificationMap,
    pub src_module_map: ModuleMap,
    pub ffi_module_map: ModuleMap,
    pub dependency_graph: DependencyGraph,
}

/// The part of the cache module loaders consume
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerView<'a> {
    pub src_map: &'a ModuleMap,
    pub ffi_map: &'a ModuleMap,
    pub graph: &'a DependencyGraph,
}

/// File lists and modification stamps gathered at the start of a pass
#[derive(Debug, Clone, Default)]
pub struct SourceScan {
    pub src_files: FileSet,
    pub ffi_files: FileSet,
    pub src_modifications: ModificationMap,
    pub ffi_modifications: ModificationMap,
}

impl SourceScan {
    /// Expands the configured patterns and stamps every matching file
    pub async fn run(globber: &dyn FileGlobber, config: &BuildConfig) -> Result<Self, BuildError> {
        let src_files = globber.glob(&config.src).await?;
        let ffi_files = globber.glob(&config.ffi).await?;

        let (src_modifications, ffi_modifications) = tokio::try_join!(
            ModificationMap::scan(&src_files),
            ModificationMap::scan(&ffi_files)
        )?;

        debug!(
            src = src_files.len(),
            ffi = ffi_files.len(),
            "Scanned source files"
        );

        Ok(Self {
            src_files,
            ffi_files,
            src_modifications,
            ffi_modifications,
        })
    }
}

impl Cache {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Derives the next cache from this one.
    ///
    /// Both module maps are updated incrementally and concurrently against this
    /// cache's stamps. With a bundle, the dependency graph is rebuilt from it;
    /// without one, the current graph is kept. Any failure leaves `self` as the
    /// cache of record.
    pub async fn updated(
        &self,
        scan: SourceScan,
        parser: &dyn ModuleNameParser,
        bundle: Option<&str>,
        namespace: &str,
    ) -> Result<Cache, BuildError> {
        let (src_module_map, ffi_module_map) = tokio::try_join!(
            update_sources(
                parser,
                SourceKind::Primary,
                &scan.src_files,
                &self.src_module_map,
                &self.src_modification_map,
                &scan.src_modifications,
            ),
            update_sources(
                parser,
                SourceKind::Foreign,
                &scan.ffi_files,
                &self.ffi_module_map,
                &self.ffi_modification_map,
                &scan.ffi_modifications,
            )
        )?;

        let dependency_graph = match bundle {
            Some(text) => DependencyGraph::rebuild_from_bundle(text, namespace)?,
            None => self.dependency_graph.clone(),
        };

        Ok(Cache {
            src_files: scan.src_files,
            ffi_files: scan.ffi_files,
            src_modification_map: scan.src_modifications,
            ffi_modification_map: scan.ffi_modifications,
            src_module_map,
            ffi_module_map,
            dependency_graph,
        })
    }

    pub fn view(&self) -> ConsumerView<'_> {
        ConsumerView {
            src_map: &self.src_module_map,
            ffi_map: &self.ffi_module_map,
            graph: &self.dependency_graph,
        }
    }

    /// Source file declaring `module`
    pub fn module_path(&self, module: &str) -> Option<&Path> {
        self.src_module_map.get(module)
    }

    /// Foreign file implementing `module`
    pub fn foreign_path(&self, module: &str) -> Option<&Path> {
        self.ffi_module_map.get(module)
    }

    pub fn dependencies_of(&self, module: &str) -> Option<&BTreeSet<String>> {
        self.dependency_graph.dependencies_of(module)
    }

    pub fn transitive_dependencies(&self, module: &str) -> BTreeSet<String> {
        self.dependency_graph.transitive_dependencies(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::GlobWalker;
    use crate::modules::SourceModuleParser;
    use filetime::{set_file_mtime, FileTime};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const BUNDLE: &str = r#"var PS = {};
(function(exports) {
})(PS["Util"] = PS["Util"] || {});
(function(exports) {
  var Util = PS["Util"];
})(PS["Main"] = PS["Main"] || {});
"#;

    fn write(root: &Path, rel: &str, content: &str, mtime: i64) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
        path
    }

    fn config() -> BuildConfig {
        BuildConfig {
            src: vec!["src/**/*.purs".to_string()],
            ffi: vec!["src/**/*.js".to_string()],
            ..Default::default()
        }
    }

    async fn scan(root: &Path) -> SourceScan {
        SourceScan::run(&GlobWalker::new(root), &config()).await.unwrap()
    }

    #[tokio::test]
    async fn test_source_scan_collects_both_sets() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "src/Main.purs", "module Main where", 10);
        let ffi = write(dir.path(), "src/Main.js", "// module Main", 10);

        let scan = scan(dir.path()).await;
        assert_eq!(scan.src_files.as_slice(), &[main.clone()]);
        assert_eq!(scan.ffi_files.as_slice(), &[ffi.clone()]);
        assert!(scan.src_modifications.contains(&main));
        assert!(scan.ffi_modifications.contains(&ffi));
    }

    #[tokio::test]
    async fn test_updated_populates_every_field() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "src/Main.purs", "module Main where", 10);
        let util = write(dir.path(), "src/Util.purs", "module Util where", 10);
        let ffi = write(dir.path(), "src/Util.js", "// module Util", 10);

        let parser = SourceModuleParser::new();
        let cache = Cache::empty()
            .updated(scan(dir.path()).await, &parser, Some(BUNDLE), "PS")
            .await
            .unwrap();

        assert_eq!(cache.src_files.len(), 2);
        assert_eq!(cache.module_path("Main"), Some(main.as_path()));
        assert_eq!(cache.module_path("Util"), Some(util.as_path()));
        assert_eq!(cache.foreign_path("Util"), Some(ffi.as_path()));
        assert_eq!(
            cache.dependencies_of("Main").map(|d| d.len()),
            Some(1)
        );
        assert!(cache.transitive_dependencies("Main").contains("Util"));
    }

    #[tokio::test]
    async fn test_updated_without_bundle_keeps_graph() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/Main.purs", "module Main where", 10);

        let parser = SourceModuleParser::new();
        let first = Cache::empty()
            .updated(scan(dir.path()).await, &parser, Some(BUNDLE), "PS")
            .await
            .unwrap();
        let second = first
            .updated(scan(dir.path()).await, &parser, None, "PS")
            .await
            .unwrap();

        assert_eq!(second.dependency_graph, first.dependency_graph);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_updated_tracks_edits_and_removals() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "src/Main.purs", "module Main where", 10);
        let old = write(dir.path(), "src/Old.purs", "module Old where", 10);

        let parser = SourceModuleParser::new();
        let first = Cache::empty()
            .updated(scan(dir.path()).await, &parser, None, "PS")
            .await
            .unwrap();
        assert!(first.module_path("Old").is_some());

        std::fs::remove_file(&old).unwrap();
        write(dir.path(), "src/Main.purs", "module App.Main where", 20);

        let second = first
            .updated(scan(dir.path()).await, &parser, None, "PS")
            .await
            .unwrap();
        assert!(second.module_path("Old").is_none());
        assert!(second.module_path("Main").is_none());
        assert_eq!(second.module_path("App.Main"), Some(main.as_path()));
    }

    #[tokio::test]
    async fn test_graph_failure_aborts_update() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/Main.purs", "module Main where", 10);

        let parser = SourceModuleParser::new();
        let result = Cache::empty()
            .updated(scan(dir.path()).await, &parser, Some(BUNDLE), "")
            .await;
        assert!(matches!(result, Err(BuildError::GraphUpdate(_))));
    }

    #[test]
    fn test_view_serializes_consumer_fields() {
        let cache = Cache::empty();
        let json = serde_json::to_value(cache.view()).unwrap();
        assert!(json.get("srcMap").is_some());
        assert!(json.get("ffiMap").is_some());
        assert!(json.get("graph").is_some());
    }
}
