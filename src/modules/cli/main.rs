//! wakalib CLI
//!
//! Command-line interface for the wakalib PostgreSQL helpers.

use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wakalib_cli::{error_line, Cli, Commands};
use wakalib_core::WakalibError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let verbose = cli.verbose;
    if let Err(e) = run(cli).await {
        if e.is_error() {
            debug!(error = %e, "Command failed");
        }
        eprintln!("{}", error_line(&e, verbose));
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), WakalibError> {
    match cli.command {
        Commands::Roles(cmd) => cmd.execute(&cli.file),
        Commands::Ping(cmd) => cmd.execute(&cli.file).await,
        Commands::Query(cmd) => cmd.execute(&cli.file).await,
    }
}
