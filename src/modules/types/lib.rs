//! Type definitions for wakalib
//!
//! This crate contains small shared enums used across the wakalib codebase
//! to describe statements: comparison operators, condition joins and fetch
//! methods.

pub mod fetch;
pub mod operator;

pub use fetch::{FetchMethod, Join};
pub use operator::Operator;
