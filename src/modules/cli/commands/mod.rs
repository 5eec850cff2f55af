//! CLI commands

mod ping;
mod query;
mod roles;

pub use ping::PingCommand;
pub use query::QueryCommand;
pub use roles::RolesCommand;

use clap::{Parser, Subcommand};

/// wakalib - credential-scoped PostgreSQL helpers
#[derive(Parser, Debug)]
#[command(name = "wakalib")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Credential file path (JSON, or YAML with a .yaml/.yml extension)
    ///
    /// This is a *global* option so it can be specified after subcommands,
    /// e.g. `wakalib roles -f credentials.json`.
    #[arg(
        short = 'f',
        long = "file",
        global = true,
        default_value = "credentials.json"
    )]
    pub file: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the roles in the credential file
    Roles(RolesCommand),

    /// Connect with a role and run a health check
    Ping(PingCommand),

    /// Run a read statement and print the result as JSON
    Query(QueryCommand),
}
