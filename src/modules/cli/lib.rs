//! wakalib CLI
//!
//! This crate provides the command-line interface for wakalib including:
//! - roles: List the roles of a credential file
//! - ping: Check that a role's database answers
//! - query: Run a read statement and print the result as JSON

pub mod commands;

pub use commands::{Cli, Commands};

use wakalib_core::WakalibError;

/// Line printed to stderr when a command fails
///
/// Connection and internal details are withheld unless `verbose` is set.
pub fn error_line(error: &WakalibError, verbose: bool) -> String {
    let message = if verbose {
        error.to_string()
    } else {
        error.sanitized_message()
    };
    format!("Error: {}", message)
}
