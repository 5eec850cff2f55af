//! Condition joins and fetch methods

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How multiple WHERE conditions are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Join {
    #[default]
    And,
    Or,
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Join::And => write!(f, "AND"),
            Join::Or => write!(f, "OR"),
        }
    }
}

impl FromStr for Join {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AND" => Ok(Join::And),
            "OR" => Ok(Join::Or),
            _ => Err(format!("Unknown join: {}", s)),
        }
    }
}

/// How many rows a SELECT returns to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// First row only
    #[default]
    #[serde(alias = "fetchone")]
    One,
    /// Every row
    #[serde(alias = "fetchall")]
    All,
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMethod::One => write!(f, "fetchone"),
            FetchMethod::All => write!(f, "fetchall"),
        }
    }
}

impl FromStr for FetchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "one" | "fetchone" => Ok(FetchMethod::One),
            "all" | "fetchall" => Ok(FetchMethod::All),
            _ => Err(format!("Unknown fetch method: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_from_str() {
        assert_eq!(Join::from_str("and").unwrap(), Join::And);
        assert_eq!(Join::from_str("OR").unwrap(), Join::Or);
        assert!(Join::from_str("xor").is_err());
        assert_eq!(Join::default(), Join::And);
    }

    #[test]
    fn test_join_display() {
        assert_eq!(Join::And.to_string(), "AND");
        assert_eq!(Join::Or.to_string(), "OR");
    }

    #[test]
    fn test_fetch_method_from_str() {
        assert_eq!(FetchMethod::from_str("fetchone").unwrap(), FetchMethod::One);
        assert_eq!(FetchMethod::from_str("all").unwrap(), FetchMethod::All);
        assert!(FetchMethod::from_str("fetchmany").is_err());
    }

    #[test]
    fn test_fetch_method_serde() {
        let method: FetchMethod = serde_json::from_str("\"fetchall\"").unwrap();
        assert_eq!(method, FetchMethod::All);
        assert_eq!(serde_json::to_string(&FetchMethod::One).unwrap(), "\"one\"");
    }
}
