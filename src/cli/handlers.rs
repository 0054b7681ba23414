use super::commands::BuildArgs;
use super::output::{OutputFormat, OutputFormatter};
use crate::config::BuildConfig;
use crate::pipeline::{Orchestrator, ResolvedModule};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_BUILD_FAILED: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

const DEFAULT_CONFIG_FILE: &str = "psbuild.toml";

pub async fn handle_build(args: &BuildArgs, quiet: bool) -> i32 {
    let root = match resolve_root(args.project_path.as_deref()) {
        Ok(root) => root,
        Err(e) => {
            error!("Failed to resolve project root: {:#}", e);
            eprintln!("Error: {:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let config = match load_config(args, &root) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            eprintln!("Error: {:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    info!(
        root = %root.display(),
        bundle = config.bundle,
        entries = args.entries.len(),
        "Starting build"
    );

    let entries = args
        .entries
        .iter()
        .map(|entry| ResolvedModule::new(entry.display().to_string(), root.join(entry)))
        .collect();

    let orchestrator = Orchestrator::new(config, &root);
    let outcome = orchestrator.run_pass(entries).await;

    if let Some(err) = &outcome.error {
        error!(stage = err.stage(), "Build failed");
        eprintln!("{}", err);
        return EXIT_BUILD_FAILED;
    }

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    if quiet && format == OutputFormat::Human {
        return EXIT_SUCCESS;
    }

    match OutputFormatter::new(format).format(&outcome) {
        Ok(text) => {
            println!("{}", text.trim_end());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_BUILD_FAILED
        }
    }
}

fn resolve_root(path: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(match path {
        Some(path) => cwd.join(path),
        None => cwd,
    })
}

/// Loads the explicit config file, or `psbuild.toml` under `root` when present,
/// then applies environment and flag overrides
pub fn load_config(args: &BuildArgs, root: &Path) -> Result<BuildConfig> {
    let config = match &args.config {
        Some(path) => BuildConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let default_path = root.join(DEFAULT_CONFIG_FILE);
            if default_path.is_file() {
                debug!(path = %default_path.display(), "Using project config");
                BuildConfig::load(&default_path)
                    .with_context(|| format!("Failed to load config from {}", default_path.display()))?
            } else {
                BuildConfig::default()
            }
        }
    };

    let mut config = config
        .apply_env()
        .context("Failed to apply environment overrides")?;
    if args.no_bundle {
        config.bundle = false;
    }
    if config.bundle_output.is_relative() {
        config.bundle_output = root.join(&config.bundle_output);
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}
