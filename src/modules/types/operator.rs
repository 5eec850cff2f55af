//! Comparison operators usable in WHERE conditions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<=")]
    LtEq,
    /// Membership in a list, rendered as `= ANY(...)`
    #[serde(rename = "in")]
    In,
    #[serde(rename = "like")]
    Like,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let spelled = match lowered.as_str() {
            "==" => "=",
            "!=" => "<>",
            other => other,
        };
        Operator::all()
            .iter()
            .copied()
            .find(|op| op.as_str() == spelled)
            .ok_or_else(|| format!("Unknown operator: {}", s))
    }
}

impl Operator {
    /// Returns all supported operators
    pub fn all() -> &'static [Operator] {
        &[
            Operator::Eq,
            Operator::NotEq,
            Operator::Gt,
            Operator::Lt,
            Operator::GtEq,
            Operator::LtEq,
            Operator::In,
            Operator::Like,
        ]
    }

    /// SQL spelling of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::GtEq => ">=",
            Operator::LtEq => "<=",
            Operator::In => "in",
            Operator::Like => "like",
        }
    }

    /// Returns true if the operator expects a list value
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_from_str() {
        assert_eq!(Operator::from_str("=").unwrap(), Operator::Eq);
        assert_eq!(Operator::from_str("!=").unwrap(), Operator::NotEq);
        assert_eq!(Operator::from_str(">=").unwrap(), Operator::GtEq);
        assert_eq!(Operator::from_str("IN").unwrap(), Operator::In);
        assert_eq!(Operator::from_str("Like").unwrap(), Operator::Like);
        assert!(Operator::from_str("~~").is_err());
    }

    #[test]
    fn test_operator_display_round_trips() {
        for op in Operator::all() {
            assert_eq!(Operator::from_str(&op.to_string()).unwrap(), *op);
        }
    }

    #[test]
    fn test_operator_serde() {
        let json = serde_json::to_string(&Operator::NotEq).unwrap();
        assert_eq!(json, "\"<>\"");

        let op: Operator = serde_json::from_str("\"in\"").unwrap();
        assert_eq!(op, Operator::In);
        assert!(op.takes_list());
    }
}
