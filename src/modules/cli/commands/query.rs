//! Query command implementation

use clap::Args;
use serde_json::Value;
use wakalib_core::{Params, WakalibError};
use wakalib_db::DbHandling;

/// Query command arguments
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Role key in the credential file
    #[arg(short, long)]
    pub role: String,

    /// Statement with `%(KEY)s` placeholders
    #[arg(short, long)]
    pub sql: String,

    /// Placeholder value as KEY=VALUE; VALUE is read as JSON when it parses
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,

    /// Print every row instead of the first one
    #[arg(short, long)]
    pub all: bool,
}

impl QueryCommand {
    /// Execute the query command
    pub async fn execute(&self, credentials_path: &str) -> Result<(), WakalibError> {
        let params = parse_params(&self.params)?;
        let params = (!params.is_empty()).then_some(&params);

        let mut db = DbHandling::new(credentials_path, self.role.as_str())?;
        let output = if self.all {
            let rows = db.select_fetchall(&self.sql, params).await?;
            serde_json::json!({ "columns": rows.columns, "rows": rows.rows })
        } else {
            match db.select_fetchone(&self.sql, params).await? {
                Some(record) => Value::Array(record.into_values()),
                None => Value::Null,
            }
        };
        db.close().await?;

        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| WakalibError::Internal(format!("JSON serialization failed: {}", e)))?;
        println!("{}", text);
        Ok(())
    }
}

/// Parse `KEY=VALUE` pairs
fn parse_params(pairs: &[String]) -> Result<Params, WakalibError> {
    let mut params = Params::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| {
            WakalibError::InvalidArgument(format!("param '{}' is not KEY=VALUE", pair))
        })?;
        if key.is_empty() {
            return Err(WakalibError::InvalidArgument(format!(
                "param '{}' has an empty key",
                pair
            )));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        if params.insert(key.to_string(), value).is_some() {
            return Err(WakalibError::InvalidArgument(format!(
                "param '{}' given more than once",
                key
            )));
        }
    }
    Ok(params)
}
