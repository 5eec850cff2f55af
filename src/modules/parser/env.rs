//! `{{ env.VAR }}` resolution in credential profiles

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use wakalib_core::{Profile, WakalibError};

/// `{{ env.NAME }}`, whitespace inside the braces optional
static ENV_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Resolves environment references in profile fields
///
/// A reference to an unset variable is an error.
pub struct EnvResolver;

impl EnvResolver {
    pub fn new() -> Self {
        Self
    }

    /// Replace every reference in `value`
    pub fn resolve(&self, value: &str) -> Result<String, WakalibError> {
        if !Self::references_env(value) {
            return Ok(value.to_string());
        }

        // A missing .env is fine
        dotenvy::dotenv().ok();

        let mut unset = Vec::new();
        let resolved = ENV_REF.replace_all(value, |cap: &Captures<'_>| {
            std::env::var(&cap[1]).unwrap_or_else(|_| {
                unset.push(cap[1].to_string());
                cap[0].to_string()
            })
        });
        let resolved = resolved.into_owned();

        if !unset.is_empty() {
            return Err(WakalibError::Configuration(format!(
                "Environment variable not found: {}",
                unset.join(", ")
            )));
        }
        Ok(resolved)
    }

    /// Resolve every field of a profile in place
    pub fn resolve_profile(&self, profile: &mut Profile) -> Result<(), WakalibError> {
        let fields = [
            ("name", &mut profile.name),
            ("user", &mut profile.user),
            ("password", &mut profile.password),
            ("host", &mut profile.host),
            ("port", &mut profile.port),
        ];
        for (field, value) in fields {
            *value = self.resolve(value.as_str()).map_err(|e| match e {
                WakalibError::Configuration(msg) => {
                    WakalibError::Configuration(format!("'{}': {}", field, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Returns true if `value` holds at least one `{{ env.NAME }}`
    pub fn references_env(value: &str) -> bool {
        ENV_REF.is_match(value)
    }
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::new()
    }
}
