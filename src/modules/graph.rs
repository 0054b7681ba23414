//! Module dependency graph derived from a bundle
//!
//! The bundler emits every module as one top-level definition that assigns
//! into the namespace object, e.g.
//!
//! ```text
//! (function(exports) {
//!   var Data_Maybe = PS["Data.Maybe"];
//!   ...
//! })(PS["Main"] = PS["Main"] || {});
//! ```
//!
//! A definition is recognised by an assignment to `NS["Name"]`; its span runs
//! from the end of the previous definition statement up to that assignment.
//! Every other `NS["Other"]` reference inside the span is a dependency edge.
//! Both quote styles are accepted. The graph is rebuilt from scratch for each
//! bundle.

use crate::pipeline::BuildError;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Module name to the set of module names it references
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

struct Reference<'a> {
    name: &'a str,
    start: usize,
    end: usize,
    is_definition: bool,
}

impl DependencyGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scans `bundle` for modules defined under `namespace` and their references
    pub fn rebuild_from_bundle(bundle: &str, namespace: &str) -> Result<Self, BuildError> {
        if namespace.is_empty() {
            return Err(BuildError::GraphUpdate(
                "bundle namespace is empty".to_string(),
            ));
        }

        let pattern = format!(
            r#"{}\s*\[\s*(?:"([^"\\]*)"|'([^'\\]*)')\s*\]"#,
            regex::escape(namespace)
        );
        let reference = Regex::new(&pattern)
            .map_err(|e| BuildError::GraphUpdate(format!("invalid namespace pattern: {}", e)))?;

        let references: Vec<Reference<'_>> = reference
            .captures_iter(bundle)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if ends_with_identifier_char(&bundle[..whole.start()]) {
                    return None;
                }
                let name = caps.get(1).or_else(|| caps.get(2))?.as_str();
                Some(Reference {
                    name,
                    start: whole.start(),
                    end: whole.end(),
                    is_definition: is_assignment(&bundle[whole.end()..]),
                })
            })
            .collect();

        let mut graph = Self::empty();
        let mut span_start = 0usize;

        for definition in references.iter().filter(|r| r.is_definition) {
            if graph.edges.contains_key(definition.name) {
                return Err(BuildError::GraphUpdate(format!(
                    "module '{}' is defined more than once in the bundle",
                    definition.name
                )));
            }

            let dependencies: BTreeSet<String> = references
                .iter()
                .filter(|r| r.start >= span_start && r.end <= definition.start)
                .filter(|r| r.name != definition.name)
                .map(|r| r.name.to_string())
                .collect();
            graph.edges.insert(definition.name.to_string(), dependencies);

            span_start = statement_end(bundle, definition.end);
        }

        Ok(graph)
    }

    /// Direct dependencies of `module`
    pub fn dependencies_of(&self, module: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(module)
    }

    /// Every module reachable from `module`, excluding `module` itself
    pub fn transitive_dependencies(&self, module: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = vec![module];
        while let Some(current) = stack.pop() {
            if let Some(deps) = self.edges.get(current) {
                for dep in deps {
                    if dep != module && seen.insert(dep.clone()) {
                        stack.push(dep);
                    }
                }
            }
        }
        seen
    }

    pub fn modules(&self) -> impl Iterator<Item = &String> {
        self.edges.keys()
    }

    pub fn contains(&self, module: &str) -> bool {
        self.edges.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Guards against `XPS["A"]` matching namespace `PS`
fn ends_with_identifier_char(before: &str) -> bool {
    before
        .chars()
        .next_back()
        .map(|c| c.is_alphanumeric() || c == '_' || c == '$')
        .unwrap_or(false)
}

/// `true` if `rest` starts with `=` that is not part of `==`
fn is_assignment(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.starts_with('=') && !rest.starts_with("==")
}

/// Offset just past the `;` or newline that ends the statement containing `from`
fn statement_end(bundle: &str, from: usize) -> usize {
    bundle[from..]
        .find(&[';', '\n'][..])
        .map(|offset| from + offset + 1)
        .unwrap_or(bundle.len())
}
