//! Module name resolution and the bundle dependency graph

pub mod graph;
pub mod map;
pub mod parser;

pub use graph::DependencyGraph;
pub use map::{update_sources, ModuleMap};
pub use parser::{ModuleNameParser, SourceKind, SourceModuleParser};
