//! Statement preparation
//!
//! Turns caller input (SQL with `%(KEY)s` placeholders, or a described
//! statement) into positional SQL plus the values to bind.

mod binder;
mod builder;
mod placeholder;

pub(crate) use binder::{bind_params, to_params};
pub use builder::{render, render_exists};
pub use placeholder::compile;

use serde_json::Value;

/// Positional SQL (`$1`, `$2`, ...) and its arguments in order
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}
