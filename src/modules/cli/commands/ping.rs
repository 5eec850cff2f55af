//! Ping command implementation

use clap::Args;
use tracing::info;
use wakalib_core::WakalibError;
use wakalib_db::DbHandling;

/// Ping command arguments
#[derive(Args, Debug)]
pub struct PingCommand {
    /// Role key in the credential file
    #[arg(short, long)]
    pub role: String,
}

impl PingCommand {
    /// Execute the ping command
    pub async fn execute(&self, credentials_path: &str) -> Result<(), WakalibError> {
        let mut db = DbHandling::new(credentials_path, self.role.as_str())?;
        db.ping().await?;
        info!(role = %self.role, "Database is reachable");
        println!("ok: {}", db.db_config().summary());
        db.close().await
    }
}
