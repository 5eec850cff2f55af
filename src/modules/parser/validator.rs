//! Credential profile validation

use wakalib_core::{CredentialStore, Profile, WakalibError};

/// Profile validator
///
/// An empty password is accepted; the server decides whether it may log in.
pub struct ProfileValidator;

impl ProfileValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate every profile in the store
    pub fn validate(&self, store: &CredentialStore) -> Result<(), WakalibError> {
        for (role, profile) in store.iter() {
            self.validate_role(role)?;
            self.validate_profile(role, profile)?;
        }
        Ok(())
    }

    fn validate_role(&self, role: &str) -> Result<(), WakalibError> {
        if role.trim().is_empty() {
            return Err(WakalibError::Configuration(
                "Role name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a single profile
    pub fn validate_profile(&self, role: &str, profile: &Profile) -> Result<(), WakalibError> {
        let required = [
            ("name", &profile.name),
            ("user", &profile.user),
            ("host", &profile.host),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(WakalibError::Configuration(format!(
                    "Role '{}' has an empty '{}'",
                    role, field
                )));
            }
        }

        if profile.port_number().is_none() {
            return Err(WakalibError::Configuration(format!(
                "Role '{}' has an invalid port '{}': expected 1-65535",
                role, profile.port
            )));
        }

        Ok(())
    }
}

impl Default for ProfileValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_profile() -> Profile {
        Profile::new("app", "reader", "pw", "localhost", "5432")
    }

    #[test]
    fn test_valid_store() {
        let store = CredentialStore::new().with_profile("db/reader", valid_profile());
        assert!(ProfileValidator::new().validate(&store).is_ok());
    }

    #[test]
    fn test_empty_host() {
        let mut profile = valid_profile();
        profile.host = " ".to_string();
        let store = CredentialStore::new().with_profile("db/reader", profile);

        let result = ProfileValidator::new().validate(&store);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("'host'"));
    }

    #[test]
    fn test_invalid_port() {
        for port in ["abc", "0", "70000", ""] {
            let mut profile = valid_profile();
            profile.port = port.to_string();
            let result = ProfileValidator::new().validate_profile("db/reader", &profile);
            assert!(
                matches!(result, Err(WakalibError::Configuration(_))),
                "port {:?} should be rejected",
                port
            );
        }
    }

    #[test]
    fn test_empty_password() {
        let mut profile = valid_profile();
        profile.password = String::new();

        assert!(ProfileValidator::new().validate_profile("r", &profile).is_ok());
    }

    #[test]
    fn test_empty_role_name() {
        let store = CredentialStore::new().with_profile("", valid_profile());
        assert!(ProfileValidator::new().validate(&store).is_err());
    }
}
