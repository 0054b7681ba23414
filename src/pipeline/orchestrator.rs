//! Per-pass state machine driving compile, bundle, cache update and persist
//!
//! Every host build pass gets a fresh [`PassContext`]. Callers register a
//! callback against the pass; the first request while the pass is still
//! awaiting its trigger spawns the pipeline, and every callback registered on
//! that pass, before or after the run started, receives the same
//! [`PassOutcome`] in registration order.

use super::cache::{Cache, SourceScan};
use super::context::{
    HostArtifact, ModuleDescriptor, PassCallback, PassContext, PassOutcome, PassPhase,
    ResolvedModule,
};
use super::error::{BuildError, ParseFailure};
use crate::config::BuildConfig;
use crate::fs::{FileGlobber, GlobWalker};
use crate::modules::{ModuleNameParser, SourceKind, SourceModuleParser};
use crate::tools::{bundler_args, compiler_args, ProcessRunner, ToolRunner};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PassState {
    id: u64,
    context: Mutex<PassContext>,
}

struct Inner {
    config: BuildConfig,
    globber: Arc<dyn FileGlobber>,
    parser: Arc<dyn ModuleNameParser>,
    runner: Arc<dyn ToolRunner>,
    cache: Mutex<Arc<Cache>>,
    current: Mutex<Option<Arc<PassState>>>,
    run_lock: tokio::sync::Mutex<()>,
    pass_ids: AtomicU64,
}

impl Inner {
    fn snapshot(&self) -> Arc<Cache> {
        lock(&self.cache).clone()
    }
}

/// Owns the cache of record and the state of the current build pass
///
/// Cloning is cheap and every clone drives the same orchestrator. Requests
/// spawn onto the ambient Tokio runtime, so they must be made from inside one.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Orchestrator using the filesystem walker, header parser and real processes under `root`
    pub fn new(config: BuildConfig, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::with_collaborators(
            config,
            Arc::new(GlobWalker::new(&root)),
            Arc::new(SourceModuleParser::new()),
            Arc::new(ProcessRunner::in_dir(root)),
        )
    }

    pub fn with_collaborators(
        config: BuildConfig,
        globber: Arc<dyn FileGlobber>,
        parser: Arc<dyn ModuleNameParser>,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                globber,
                parser,
                runner,
                cache: Mutex::new(Arc::new(Cache::empty())),
                current: Mutex::new(None),
                run_lock: tokio::sync::Mutex::new(()),
                pass_ids: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.inner.config
    }

    /// The cache of record; never observed half-updated
    pub fn snapshot(&self) -> Arc<Cache> {
        self.inner.snapshot()
    }

    /// Announces a new build pass and discards the previous pass context.
    ///
    /// Handles to the previous pass stay bound to it and still receive its outcome.
    pub fn begin_pass(&self) -> PassHandle {
        let id = self.inner.pass_ids.fetch_add(1, Ordering::SeqCst) + 1;
        let pass = Arc::new(PassState {
            id,
            context: Mutex::new(PassContext::new()),
        });
        *lock(&self.inner.current) = Some(pass.clone());

        debug!(pass = id, "Build pass started");
        self.handle(pass)
    }

    /// Phase of the current pass; `Idle` before the first one
    pub fn phase(&self) -> PassPhase {
        let current = lock(&self.inner.current).clone();
        match current {
            Some(pass) => {
                let phase = lock(&pass.context).phase;
                phase
            }
            None => PassPhase::Idle,
        }
    }

    /// Handle to the current pass, starting one if none was announced
    pub fn current_pass(&self) -> PassHandle {
        let current = lock(&self.inner.current).clone();
        match current {
            Some(pass) => self.handle(pass),
            None => self.begin_pass(),
        }
    }

    /// Records `descriptor` as a bundle entry when it names a source file.
    ///
    /// Entries are read when bundling starts, so descriptors arriving while the
    /// compiler runs still reach the bundler.
    pub fn on_dependency_resolved(&self, descriptor: ModuleDescriptor) {
        if !descriptor.has_extension(&self.inner.config.source_extension) {
            return;
        }

        let pass = self.current_pass();
        let mut ctx = lock(&pass.pass.context);
        if ctx.phase == PassPhase::Delivered {
            debug!(pass = pass.id(), request = %descriptor.user_request, "Entry arrived after delivery");
            return;
        }
        debug!(pass = pass.id(), request = %descriptor.user_request, "Bundle entry candidate");
        ctx.bundle_entries.push(descriptor);
    }

    /// Attaches the host artifact to the current pass when `descriptor` names a
    /// source file, returning the handle its loader registers on
    pub fn on_module_loaded(
        &self,
        descriptor: &ModuleDescriptor,
        artifact: Arc<dyn HostArtifact>,
    ) -> Option<PassHandle> {
        if !descriptor.has_extension(&self.inner.config.source_extension) {
            return None;
        }

        let pass = self.current_pass();
        lock(&pass.pass.context).active_artifact = Some(artifact);
        Some(pass)
    }

    /// Registers `callback` on the current pass and triggers it if needed
    pub fn request<F>(&self, callback: F)
    where
        F: FnOnce(PassOutcome) + Send + 'static,
    {
        self.current_pass().request(callback);
    }

    pub async fn request_async(&self) -> PassOutcome {
        self.current_pass().request_async().await
    }

    /// Runs one complete pass with `entries` as both the registered entry
    /// descriptors and the host's resolved modules
    pub async fn run_pass(&self, entries: Vec<ResolvedModule>) -> PassOutcome {
        let pass = self.begin_pass();
        let descriptors: Vec<ModuleDescriptor> = entries
            .iter()
            .map(|entry| ModuleDescriptor::new(entry.user_request.clone()))
            .collect();
        let artifact: Arc<dyn HostArtifact> = Arc::new(entries);
        for descriptor in descriptors {
            self.on_module_loaded(&descriptor, artifact.clone());
            self.on_dependency_resolved(descriptor);
        }
        pass.request_async().await
    }

    fn handle(&self, pass: Arc<PassState>) -> PassHandle {
        PassHandle {
            orchestrator: self.clone(),
            pass,
        }
    }

    fn register(&self, pass: &Arc<PassState>, callback: PassCallback) {
        let drain_now = {
            let mut ctx = lock(&pass.context);
            ctx.callbacks.push(callback);
            if ctx.phase == PassPhase::Delivered && !ctx.draining {
                ctx.draining = true;
                true
            } else {
                false
            }
        };

        if drain_now {
            debug!(pass = pass.id, "Answering late registration");
            drain(pass);
        }
    }

    fn trigger(&self, pass: &Arc<PassState>) {
        {
            let mut ctx = lock(&pass.context);
            if !ctx.requires_compiling() {
                return;
            }
            ctx.phase = PassPhase::Running;
        }

        let inner = self.inner.clone();
        let pass = pass.clone();
        tokio::spawn(async move {
            let run = tokio::spawn(run_pipeline(inner.clone(), pass.clone()));
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(pass = pass.id, error = %err, "Pipeline task stopped");
                    PassOutcome::failure(inner.snapshot(), BuildError::Aborted(err.to_string()))
                }
            };
            deliver(&pass, outcome);
        });
    }
}

/// A registration point bound to one specific build pass
#[derive(Clone)]
pub struct PassHandle {
    orchestrator: Orchestrator,
    pass: Arc<PassState>,
}

impl PassHandle {
    pub fn id(&self) -> u64 {
        self.pass.id
    }

    pub fn phase(&self) -> PassPhase {
        lock(&self.pass.context).phase
    }

    /// The delivered outcome, once the pass has settled
    pub fn outcome(&self) -> Option<PassOutcome> {
        lock(&self.pass.context).outcome.clone()
    }

    /// Registers `callback` on this pass, starting the pipeline on first request
    pub fn request<F>(&self, callback: F)
    where
        F: FnOnce(PassOutcome) + Send + 'static,
    {
        self.orchestrator.register(&self.pass, Box::new(callback));
        self.orchestrator.trigger(&self.pass);
    }

    pub async fn request_async(&self) -> PassOutcome {
        let (tx, rx) = oneshot::channel();
        self.request(move |outcome| {
            let _ = tx.send(outcome);
        });

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => PassOutcome::failure(
                self.orchestrator.snapshot(),
                BuildError::Aborted("outcome was never delivered".to_string()),
            ),
        }
    }
}

fn deliver(pass: &PassState, outcome: PassOutcome) {
    {
        let mut ctx = lock(&pass.context);
        ctx.outcome = Some(outcome);
        ctx.phase = PassPhase::Delivered;
        if ctx.draining {
            return;
        }
        ctx.draining = true;
    }
    drain(pass);
}

/// Invokes pending callbacks outside the lock until none are left.
/// Callers must have set `draining`.
fn drain(pass: &PassState) {
    loop {
        let (batch, outcome) = {
            let mut ctx = lock(&pass.context);
            let outcome = match (&ctx.outcome, ctx.callbacks.is_empty()) {
                (Some(outcome), false) => outcome.clone(),
                _ => {
                    ctx.draining = false;
                    return;
                }
            };
            (std::mem::take(&mut ctx.callbacks), outcome)
        };

        for callback in batch {
            callback(outcome.clone());
        }
    }
}

async fn run_pipeline(inner: Arc<Inner>, pass: Arc<PassState>) -> PassOutcome {
    let _running = inner.run_lock.lock().await;
    let previous = inner.snapshot();
    let start = Instant::now();

    match execute(&inner, &pass, &previous).await {
        Ok(next) => {
            let next = Arc::new(next);
            *lock(&inner.cache) = next.clone();
            info!(
                pass = pass.id,
                modules = next.src_module_map.len(),
                foreign = next.ffi_module_map.len(),
                graph = next.dependency_graph.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Build pass complete"
            );
            PassOutcome::success(next)
        }
        Err(err) => {
            warn!(pass = pass.id, stage = err.stage(), error = %err, "Build pass failed");
            PassOutcome::failure(previous, err)
        }
    }
}

async fn execute(inner: &Inner, pass: &PassState, previous: &Cache) -> Result<Cache, BuildError> {
    let config = &inner.config;
    let scan = SourceScan::run(inner.globber.as_ref(), config).await?;

    debug!(pass = pass.id, "Compiling PureScript files");
    let compiled = inner
        .runner
        .run(&config.compiler, &compiler_args(config))
        .await?;
    if !compiled.is_success() {
        return Err(BuildError::Compiler {
            status: compiled.status,
            stderr: compiled.stderr,
        });
    }

    let bundle = if config.bundle {
        let entries = entry_modules(inner, pass).await?;
        debug!(pass = pass.id, entries = ?entries, "Bundling compiled PureScript files");
        let bundled = inner
            .runner
            .run(&config.bundler, &bundler_args(config, &entries))
            .await?;
        if !bundled.is_success() {
            return Err(BuildError::Bundler {
                status: bundled.status,
                stderr: bundled.stderr,
            });
        }
        Some(bundled.stdout)
    } else {
        debug!(pass = pass.id, "Skipped bundling");
        None
    };

    debug!(pass = pass.id, "Updating dependency graph");
    let next = previous
        .updated(
            scan,
            inner.parser.as_ref(),
            bundle.as_deref(),
            &config.bundle_namespace,
        )
        .await?;

    if let Some(bundle) = &bundle {
        debug!(pass = pass.id, path = %config.bundle_output.display(), "Writing bundle");
        persist_bundle(&config.bundle_output, bundle, &config.bundle_namespace).await?;
    }

    Ok(next)
}

/// Module names of the registered entries the host has resolved, in registration order
async fn entry_modules(inner: &Inner, pass: &PassState) -> Result<Vec<String>, BuildError> {
    let (descriptors, artifact) = {
        let ctx = lock(&pass.context);
        (ctx.bundle_entries.clone(), ctx.active_artifact.clone())
    };
    let resolved = artifact.map(|a| a.resolved_modules()).unwrap_or_default();

    let mut names: Vec<String> = Vec::new();
    let mut failures = Vec::new();
    for descriptor in &descriptors {
        let Some(module) = resolved
            .iter()
            .find(|m| m.user_request == descriptor.user_request)
        else {
            debug!(request = %descriptor.user_request, "Entry was not resolved by the host");
            continue;
        };

        match inner
            .parser
            .module_name(SourceKind::Primary, &module.resource)
            .await
        {
            Ok(Some(name)) => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            Ok(None) => {
                debug!(path = %module.resource.display(), "Entry declares no module");
            }
            Err(err) => failures.push(ParseFailure {
                path: module.resource.clone(),
                reason: format!("{:#}", err),
            }),
        }
    }

    if !failures.is_empty() {
        return Err(BuildError::Parse(failures));
    }
    if names.is_empty() {
        return Err(BuildError::NoEntryPoints);
    }
    Ok(names)
}

/// Writes the bundle followed by an export of the namespace object
pub async fn persist_bundle(path: &Path, bundle: &str, namespace: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BuildError::io(parent, e))?;
    }

    let contents = format!("{}module.exports = {};", bundle, namespace);
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| BuildError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persist_bundle_appends_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dist/nested/bundle.js");

        persist_bundle(&path, "var PS = {};", "PS").await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "var PS = {};module.exports = PS;");
    }

    #[tokio::test]
    async fn test_persist_bundle_reports_path_on_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let err = persist_bundle(&blocker.join("bundle.js"), "", "PS")
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }

    #[test]
    fn test_current_pass_begins_implicitly() {
        let orchestrator = Orchestrator::new(BuildConfig::default(), ".");
        assert_eq!(orchestrator.phase(), PassPhase::Idle);
        let pass = orchestrator.current_pass();
        assert_eq!(pass.id(), 1);
        assert_eq!(pass.phase(), PassPhase::AwaitingTrigger);
        assert_eq!(orchestrator.current_pass().id(), 1);
        assert_eq!(orchestrator.begin_pass().id(), 2);
    }

    #[test]
    fn test_only_source_descriptors_become_entries() {
        let orchestrator = Orchestrator::new(BuildConfig::default(), ".");
        let pass = orchestrator.begin_pass();
        orchestrator.on_dependency_resolved(ModuleDescriptor::new("./src/Main.purs"));
        orchestrator.on_dependency_resolved(ModuleDescriptor::new("./src/index.js"));
        orchestrator.on_dependency_resolved(ModuleDescriptor::new("react"));

        let ctx = lock(&pass.pass.context);
        assert_eq!(
            ctx.bundle_entries,
            vec![ModuleDescriptor::new("./src/Main.purs")]
        );
    }

    #[test]
    fn test_only_source_requests_attach_artifact() {
        let orchestrator = Orchestrator::new(BuildConfig::default(), ".");
        let pass = orchestrator.begin_pass();
        let artifact: Arc<dyn HostArtifact> = Arc::new(Vec::<ResolvedModule>::new());

        let ignored = orchestrator.on_module_loaded(&ModuleDescriptor::new("./src/index.js"), artifact.clone());
        assert!(ignored.is_none());
        assert!(lock(&pass.pass.context).active_artifact.is_none());

        let attached = orchestrator
            .on_module_loaded(&ModuleDescriptor::new("./src/Main.purs"), artifact)
            .unwrap();
        assert_eq!(attached.id(), pass.id());
        assert!(lock(&pass.pass.context).active_artifact.is_some());
    }
}
