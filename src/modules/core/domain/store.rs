//! Credential store: role key -> connection profile

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Profile;
use crate::error::WakalibError;

/// All profiles from one credential file, keyed by role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialStore {
    profiles: BTreeMap<String, Profile>,
}

impl CredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the profile for `role`
    pub fn insert(&mut self, role: impl Into<String>, profile: Profile) -> Option<Profile> {
        self.profiles.insert(role.into(), profile)
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_profile(mut self, role: impl Into<String>, profile: Profile) -> Self {
        self.insert(role, profile);
        self
    }

    /// Find a profile by role
    pub fn get(&self, role: &str) -> Option<&Profile> {
        self.profiles.get(role)
    }

    /// Find a profile by role, failing with a configuration error if absent
    pub fn resolve(&self, role: &str) -> Result<&Profile, WakalibError> {
        self.get(role).ok_or_else(|| {
            WakalibError::Configuration(format!(
                "Role '{}' is not found in the credentials file",
                role
            ))
        })
    }

    /// Role keys in sorted order
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Iterate over `(role, profile)` pairs in role order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Profile)> {
        self.profiles.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable access for in-place rewriting (e.g. env substitution)
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Profile)> {
        self.profiles.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
