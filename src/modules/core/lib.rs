//! Core domain logic for wakalib
//!
//! This crate contains the domain models (credential profiles, statement
//! descriptions, query results) and the error type shared by every wakalib
//! crate.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{Result, WakalibError};
