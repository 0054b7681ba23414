//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use filetime::{set_file_mtime, FileTime};
use psbuild::{BuildConfig, BuildError, ToolOutput, ToolRunner};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const COMPILER: &str = "psc";
pub const BUNDLER: &str = "psc-bundle";

/// One recorded tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

/// Scripted [`ToolRunner`] that records every call
pub struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    compiler: Mutex<ToolOutput>,
    bundler: Mutex<ToolOutput>,
    gate: Option<Arc<Notify>>,
}

impl FakeRunner {
    pub fn new(bundle: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            compiler: Mutex::new(ToolOutput::success("")),
            bundler: Mutex::new(ToolOutput::success(bundle)),
            gate: None,
        }
    }

    /// Runner whose compiler waits until `gate` is notified
    pub fn gated(bundle: &str, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(bundle)
        }
    }

    pub fn set_compiler(&self, output: ToolOutput) {
        *self.compiler.lock().unwrap() = output;
    }

    pub fn set_bundler(&self, output: ToolOutput) {
        *self.bundler.lock().unwrap() = output;
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.program == program)
            .count()
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, BuildError> {
        self.calls.lock().unwrap().push(Invocation {
            program: program.to_string(),
            args: args.to_vec(),
        });

        if program == COMPILER {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(self.compiler.lock().unwrap().clone())
        } else if program == BUNDLER {
            Ok(self.bundler.lock().unwrap().clone())
        } else {
            Err(BuildError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "unknown tool"),
            })
        }
    }
}

/// Writes `content` under `root` with a fixed modification time
pub fn write_source(root: &Path, rel: &str, content: &str, mtime: i64) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    path
}

/// Project-local configuration writing the bundle under `root`
pub fn project_config(root: &Path) -> BuildConfig {
    BuildConfig {
        src: vec!["src/**/*.purs".to_string()],
        ffi: vec!["src/**/*.js".to_string()],
        bundle_output: root.join("output/bundle.js"),
        ..Default::default()
    }
}
