use psbuild::cli::commands::{CliArgs, Commands};
use psbuild::cli::handlers::handle_build;
use psbuild::util::{init_logging, LoggingConfig};
use psbuild::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(LoggingConfig::from_flags(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
    ));

    debug!("psbuild v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Build(build_args) => handle_build(build_args, args.quiet).await,
    };

    std::process::exit(exit_code);
}
