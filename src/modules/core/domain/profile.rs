//! Database connection profile

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One named set of connection parameters from a credential file
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Database name
    pub name: String,

    /// Role or user name used to log in
    pub user: String,

    /// Password for `user`
    pub password: String,

    /// Database host
    pub host: String,

    /// Database port, kept as written in the file
    #[serde(deserialize_with = "port_from_scalar")]
    pub port: String,
}

impl Profile {
    /// Create a new profile
    pub fn new(
        name: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            user: user.into(),
            password: password.into(),
            host: host.into(),
            port: port.into(),
        }
    }

    /// Port as a number, if it parses
    pub fn port_number(&self) -> Option<u16> {
        self.port.trim().parse::<u16>().ok().filter(|p| *p != 0)
    }

    /// `user@host:port/name`, safe to print
    pub fn summary(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.name)
    }

    /// Check if any field contains environment variable placeholders
    pub fn has_env_placeholders(&self) -> bool {
        [&self.name, &self.user, &self.password, &self.host, &self.port]
            .iter()
            .any(|v| v.contains("{{") && v.contains("}}"))
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Accept `"5432"` and `5432` alike
fn port_from_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(u64),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Number(n) => n.to_string(),
    })
}
