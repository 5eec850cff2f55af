//! Credential file parser

use std::path::Path;
use wakalib_core::{CredentialStore, WakalibError};

use crate::env::EnvResolver;

/// Serialization format of a credential file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick the format from the file extension; anything but `.yaml`/`.yml` is JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

/// Parser for credential files
pub struct CredentialParser;

impl CredentialParser {
    /// Parse credentials and substitute `{{ env.VAR }}` placeholders in profile fields
    pub fn parse(content: &str, format: Format) -> Result<CredentialStore, WakalibError> {
        let mut store = Self::parse_raw(content, format)?;

        let resolver = EnvResolver::new();
        for (role, profile) in store.iter_mut() {
            if profile.has_env_placeholders() {
                resolver.resolve_profile(profile).map_err(|e| match e {
                    WakalibError::Configuration(msg) => {
                        WakalibError::Configuration(format!("Role '{}': {}", role, msg))
                    }
                    other => other,
                })?;
            }
        }

        Ok(store)
    }

    /// Parse credentials without environment variable substitution
    pub fn parse_raw(content: &str, format: Format) -> Result<CredentialStore, WakalibError> {
        match format {
            Format::Json => serde_json::from_str(content).map_err(|e| {
                WakalibError::Configuration(format!("JSON parse error: {}", e))
            }),
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| {
                WakalibError::Configuration(format!("YAML parse error: {}", e))
            }),
        }
    }
}
