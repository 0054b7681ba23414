//! Host-facing types and the per-pass state the orchestrator keeps

use super::cache::{Cache, ConsumerView};
use super::error::BuildError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A module request seen by the host pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDescriptor {
    /// The request as the host recorded it, e.g. `./src/Main.purs`
    pub user_request: String,
}

impl ModuleDescriptor {
    pub fn new(user_request: impl Into<String>) -> Self {
        Self {
            user_request: user_request.into(),
        }
    }

    /// Extension of the requested path, without the dot
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.user_request)
            .extension()
            .and_then(|ext| ext.to_str())
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.extension() == Some(extension)
    }
}

/// A module the host has fully resolved to a file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub user_request: String,
    pub resource: PathBuf,
}

impl ResolvedModule {
    pub fn new(user_request: impl Into<String>, resource: impl Into<PathBuf>) -> Self {
        Self {
            user_request: user_request.into(),
            resource: resource.into(),
        }
    }
}

/// The host's artifact for the running build pass
pub trait HostArtifact: Send + Sync {
    /// Modules the host has resolved so far in this pass
    fn resolved_modules(&self) -> Vec<ResolvedModule>;
}

impl HostArtifact for Vec<ResolvedModule> {
    fn resolved_modules(&self) -> Vec<ResolvedModule> {
        self.clone()
    }
}

/// The `(error, snapshot)` pair handed to every consumer of a pass
///
/// On failure `snapshot` is the cache as it was before the pass started.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub snapshot: Arc<Cache>,
    pub error: Option<Arc<BuildError>>,
}

impl PassOutcome {
    pub fn success(snapshot: Arc<Cache>) -> Self {
        Self {
            snapshot,
            error: None,
        }
    }

    pub fn failure(snapshot: Arc<Cache>, error: BuildError) -> Self {
        Self {
            snapshot,
            error: Some(Arc::new(error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn view(&self) -> ConsumerView<'_> {
        self.snapshot.view()
    }

    pub fn into_result(self) -> Result<Arc<Cache>, Arc<BuildError>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.snapshot),
        }
    }
}

/// Receives the outcome of the pass it was registered on
pub type PassCallback = Box<dyn FnOnce(PassOutcome) + Send + 'static>;

/// Where a build pass stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    /// No pass announced yet
    Idle,
    /// Collecting entries and callbacks; nothing has run
    AwaitingTrigger,
    /// The pipeline for this pass is in flight
    Running,
    /// The outcome has been handed out
    Delivered,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingTrigger => "awaiting-trigger",
            Self::Running => "running",
            Self::Delivered => "delivered",
        };
        write!(f, "{}", name)
    }
}

/// Mutable state of one build pass; replaced wholesale when the next pass begins
pub(crate) struct PassContext {
    pub phase: PassPhase,
    pub bundle_entries: Vec<ModuleDescriptor>,
    pub callbacks: Vec<PassCallback>,
    pub active_artifact: Option<Arc<dyn HostArtifact>>,
    pub outcome: Option<PassOutcome>,
    /// Set while some thread is invoking callbacks for this pass
    pub draining: bool,
}

impl PassContext {
    pub fn new() -> Self {
        Self {
            phase: PassPhase::AwaitingTrigger,
            bundle_entries: Vec::new(),
            callbacks: Vec::new(),
            active_artifact: None,
            outcome: None,
            draining: false,
        }
    }

    /// `true` until the first trigger of the pass
    pub fn requires_compiling(&self) -> bool {
        self.phase == PassPhase::AwaitingTrigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_extension() {
        assert_eq!(ModuleDescriptor::new("./src/Main.purs").extension(), Some("purs"));
        assert!(ModuleDescriptor::new("./src/Main.purs").has_extension("purs"));
        assert!(!ModuleDescriptor::new("./src/index.js").has_extension("purs"));
        assert_eq!(ModuleDescriptor::new("lodash").extension(), None);
    }

    #[test]
    fn test_outcome_into_result() {
        let snapshot = Arc::new(Cache::empty());
        assert!(PassOutcome::success(snapshot.clone()).into_result().is_ok());

        let failed = PassOutcome::failure(snapshot, BuildError::NoEntryPoints);
        assert!(!failed.is_success());
        let err = failed.into_result().unwrap_err();
        assert!(matches!(*err, BuildError::NoEntryPoints));
    }

    #[test]
    fn test_new_context_requires_compiling() {
        let ctx = PassContext::new();
        assert!(ctx.requires_compiling());
        assert!(ctx.bundle_entries.is_empty());
        assert!(ctx.callbacks.is_empty());
        assert!(ctx.active_artifact.is_none());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(PassPhase::AwaitingTrigger.to_string(), "awaiting-trigger");
        assert_eq!(PassPhase::Delivered.to_string(), "delivered");
    }
}
