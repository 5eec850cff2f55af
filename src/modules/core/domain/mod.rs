//! Domain models for wakalib

mod profile;
mod record;
mod statement;
mod store;

pub use profile::Profile;
pub use record::{Outcome, Record, RowSet};
pub use statement::{
    DeleteQuery, ExistsCondition, Fields, InsertQuery, Params, SelectQuery, Set, Statement,
    UpdateQuery, Where,
};
pub use store::CredentialStore;
