//! Database connectors for wakalib

mod postgres;
mod row;

pub use postgres::DbHandling;
