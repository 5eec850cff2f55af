//! Credential file parsing for wakalib
//!
//! This crate loads credential files (JSON, or YAML by extension), substitutes
//! `{{ env.VAR }}` placeholders in profile fields and validates every profile.

pub mod credentials;
pub mod env;
pub mod validator;

pub use credentials::{CredentialParser, Format};
pub use validator::ProfileValidator;

use std::path::Path;
use tracing::debug;
use wakalib_core::{CredentialStore, WakalibError};

/// Parse a credential file from a path
pub fn parse_file(path: impl AsRef<Path>) -> Result<CredentialStore, WakalibError> {
    let path = path.as_ref();
    debug!("Loading credentials from: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| {
        WakalibError::Configuration(format!(
            "Failed to read credentials file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let store = parse_string(&content, Format::from_path(path))?;
    debug!(profiles = store.len(), "Loaded credentials");
    Ok(store)
}

/// Parse credentials from a string
pub fn parse_string(content: &str, format: Format) -> Result<CredentialStore, WakalibError> {
    let store = CredentialParser::parse(content, format)?;

    let validator = ProfileValidator::new();
    validator.validate(&store)?;

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"fuga_role": {{"name": "n", "user": "u", "password": "p", "host": "h", "port": "5432"}}}}"#
        )
        .unwrap();

        let store = parse_file(file.path()).unwrap();
        assert_eq!(store.roles().collect::<Vec<_>>(), vec!["fuga_role"]);
    }

    #[test]
    fn test_parse_missing_file() {
        let result = parse_file("/nonexistent/wakalib/credentials.json");
        assert!(matches!(result, Err(WakalibError::Configuration(_))));
    }

    #[test]
    fn test_parse_string_validates_port() {
        let json = r#"{"r": {"name": "n", "user": "u", "password": "p", "host": "h", "port": "abc"}}"#;
        let err = parse_string(json, Format::Json).unwrap_err();
        assert!(err.to_string().contains("invalid port"));
    }
}
