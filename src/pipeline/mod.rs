//! Build pass orchestration and the cross-pass cache

pub mod cache;
pub mod context;
pub mod error;
pub mod orchestrator;

pub use cache::{Cache, ConsumerView, SourceScan};
pub use context::{
    HostArtifact, ModuleDescriptor, PassCallback, PassOutcome, PassPhase, ResolvedModule,
};
pub use error::{BuildError, ParseFailure};
pub use orchestrator::{persist_bundle, Orchestrator, PassHandle};
