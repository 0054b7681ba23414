//! Rendering of a pass outcome for the terminal

use crate::pipeline::{Cache, PassOutcome};
use anyhow::{Context, Result};
use std::fmt::Write;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// The full cache as pretty-printed JSON
    Json,
    /// Module and dependency listing
    Human,
}

/// Formats the snapshot of a settled pass
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, outcome: &PassOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(&outcome.snapshot),
            OutputFormat::Human => Ok(self.format_human(&outcome.snapshot)),
        }
    }

    fn format_json(&self, cache: &Cache) -> Result<String> {
        serde_json::to_string_pretty(cache).context("Failed to serialize cache to JSON")
    }

    fn format_human(&self, cache: &Cache) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} source file(s), {} foreign file(s)",
            cache.src_files.len(),
            cache.ffi_files.len()
        );

        if !cache.src_module_map.is_empty() {
            let _ = writeln!(out, "\nModules:");
            for (name, path) in cache.src_module_map.iter() {
                let foreign = if cache.foreign_path(name).is_some() {
                    " [ffi]"
                } else {
                    ""
                };
                let _ = writeln!(out, "  {} -> {}{}", name, path.display(), foreign);
            }
        }

        if !cache.dependency_graph.is_empty() {
            let _ = writeln!(out, "\nDependencies:");
            for module in cache.dependency_graph.modules() {
                let deps = cache
                    .dependencies_of(module)
                    .map(|deps| deps.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
                    .unwrap_or_default();
                if deps.is_empty() {
                    let _ = writeln!(out, "  {}", module);
                } else {
                    let _ = writeln!(out, "  {} <- {}", module, deps);
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{DependencyGraph, ModuleMap};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn outcome() -> PassOutcome {
        let cache = Cache {
            src_module_map: [("Main".to_string(), PathBuf::from("src/Main.purs"))]
                .into_iter()
                .collect::<ModuleMap>(),
            dependency_graph: DependencyGraph::rebuild_from_bundle(
                "(function(exports) {\n})(PS[\"Main\"] = PS[\"Main\"] || {});\n",
                "PS",
            )
            .unwrap(),
            ..Default::default()
        };
        PassOutcome::success(Arc::new(cache))
    }

    #[test]
    fn test_human_lists_modules() {
        let text = OutputFormatter::new(OutputFormat::Human)
            .format(&outcome())
            .unwrap();
        assert!(text.contains("Main -> src/Main.purs"));
        assert!(text.contains("Dependencies:"));
    }

    #[test]
    fn test_json_uses_camel_case_keys() {
        let text = OutputFormatter::new(OutputFormat::Json)
            .format(&outcome())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["srcModuleMap"]["Main"], "src/Main.purs");
        assert!(value.get("dependencyGraph").is_some());
    }
}
