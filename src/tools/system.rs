use super::trait_def::{ToolOutput, ToolRunner};
use crate::pipeline::BuildError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// [`ToolRunner`] that spawns real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every tool from `dir` instead of the process working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, BuildError> {
        debug!(program, args = ?args, "Spawning external tool");
        let start = Instant::now();

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|source| BuildError::Spawn {
            program: program.to_string(),
            source,
        })?;

        let status = output.status.code().unwrap_or(-1);
        info!(
            program,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "External tool finished"
        );

        Ok(ToolOutput {
            status,
            stdout: decode(program, "stdout", output.stdout),
            stderr: decode(program, "stderr", output.stderr),
        })
    }
}

/// Decodes captured output, replacing invalid UTF-8 and saying so
fn decode(program: &str, stream: &str, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                program,
                stream,
                valid_up_to = e.utf8_error().valid_up_to(),
                "Tool output is not valid UTF-8; invalid bytes were replaced"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}
