//! Roles command implementation

use clap::Args;
use wakalib_core::{CredentialStore, WakalibError};
use wakalib_parser::parse_file;

/// Roles command arguments
#[derive(Args, Debug)]
pub struct RolesCommand {
    /// Print as JSON instead of one line per role
    #[arg(long)]
    pub json: bool,
}

impl RolesCommand {
    /// Execute the roles command
    pub fn execute(&self, credentials_path: &str) -> Result<(), WakalibError> {
        let store = parse_file(credentials_path)?;
        println!("{}", self.render(&store)?);
        Ok(())
    }

    /// Describe every role without revealing passwords
    fn render(&self, store: &CredentialStore) -> Result<String, WakalibError> {
        if self.json {
            let roles: Vec<serde_json::Value> = store
                .iter()
                .map(|(role, profile)| {
                    serde_json::json!({
                        "role": role,
                        "name": profile.name,
                        "user": profile.user,
                        "host": profile.host,
                        "port": profile.port,
                    })
                })
                .collect();
            return serde_json::to_string_pretty(&roles)
                .map_err(|e| WakalibError::Internal(format!("JSON serialization failed: {}", e)));
        }

        Ok(store
            .iter()
            .map(|(role, profile)| format!("{}\t{}", role, profile.summary()))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
