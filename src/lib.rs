//! psbuild - incremental PureScript compile and bundle orchestration
//!
//! The crate drives an external compiler and bundler once per host build pass,
//! no matter how many callers ask for the result, and keeps a cache that
//! survives between passes:
//!
//! - file modification stamps for primary and foreign sources
//! - module name to file maps, updated only for files that changed
//! - the module dependency graph, rebuilt from each bundle
//!
//! # Example
//!
//! ```no_run
//! use psbuild::{BuildConfig, Orchestrator, ResolvedModule};
//!
//! # async fn run() {
//! let orchestrator = Orchestrator::new(BuildConfig::default(), ".");
//! let outcome = orchestrator
//!     .run_pass(vec![ResolvedModule::new("src/Main.purs", "src/Main.purs")])
//!     .await;
//! match outcome.into_result() {
//!     Ok(cache) => println!("{:?}", cache.module_path("Main")),
//!     Err(err) => eprintln!("{}", err),
//! }
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`fs`]: pattern expansion and modification stamps
//! - [`modules`]: module name parsing, module maps and the dependency graph
//! - [`tools`]: compiler and bundler invocation
//! - [`pipeline`]: the cache and the per-pass orchestrator

pub mod cli;
pub mod config;
pub mod fs;
pub mod modules;
pub mod pipeline;
pub mod tools;
pub mod util;

pub use config::{BuildConfig, ConfigError};
pub use fs::{FileGlobber, FileSet, GlobWalker, ModificationDiff, ModificationMap};
pub use modules::{DependencyGraph, ModuleMap, ModuleNameParser, SourceKind, SourceModuleParser};
pub use pipeline::{
    BuildError, Cache, ConsumerView, HostArtifact, ModuleDescriptor, Orchestrator, PassHandle,
    PassOutcome, PassPhase, ResolvedModule,
};
pub use tools::{ProcessRunner, ToolOutput, ToolRunner};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
