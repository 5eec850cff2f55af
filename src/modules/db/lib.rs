//! Credential-scoped PostgreSQL access for wakalib
//!
//! This crate provides [`DbHandling`], which resolves a connection profile
//! from a credential file and runs parameterized statements over one lazily
//! opened connection, plus the placeholder compiler and statement renderer it
//! uses.

pub mod connectors;
pub mod executor;

pub use connectors::DbHandling;
pub use executor::{compile, render, render_exists, BoundStatement};
