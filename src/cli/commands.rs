use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental PureScript compile and bundle driver
#[derive(Parser, Debug)]
#[command(
    name = "psbuild",
    about = "Incremental PureScript compile and bundle driver",
    version,
    author,
    long_about = "psbuild runs the PureScript compiler and bundler for a project, \
                  tracks which modules each source file declares, and derives the \
                  module dependency graph from the generated bundle."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Compile and bundle the project once",
        long_about = "Runs one build pass: scans sources, compiles them, bundles the \
                      entry modules and writes the bundle.\n\n\
                      Examples:\n  \
                      psbuild build --entry src/Main.purs\n  \
                      psbuild build --config psbuild.toml --entry src/Main.purs --json\n  \
                      psbuild build --no-bundle"
    )]
    Build(BuildArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        help = "Configuration file (defaults to psbuild.toml when present)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'e',
        long = "entry",
        value_name = "PATH",
        help = "Entry source file whose module roots the bundle (repeatable)"
    )]
    pub entries: Vec<PathBuf>,

    #[arg(long, help = "Compile only; skip bundling and keep the previous graph")]
    pub no_bundle: bool,

    #[arg(long, help = "Print the resulting cache as JSON")]
    pub json: bool,

    #[arg(
        value_name = "PATH",
        help = "Project root (defaults to current directory)"
    )]
    pub project_path: Option<PathBuf>,
}
