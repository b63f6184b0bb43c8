mod config;
pub mod builder;
pub mod manual;
pub mod model;
mod report;
mod resolver;
mod schema;
pub mod store;
mod table;
pub mod templates;

pub use crate::config::*;
pub use crate::report::{error_chain, run_import, PREVIEW_ROWS};
pub use crate::resolver::{ImportSession, Upsert};
pub use crate::schema::{schema, validate, Schema};
pub use crate::table::{Field, Row, Table};
pub use crate::templates::{template, Template};

use crate::model::UserId;
use crate::store::DataStore;

/// Imports all the rows of a table into a store, without validating the table first.
///
/// Rows are independent: a row that cannot be imported is reported and the next
/// row is processed. Callers normally go through `run_import`, which validates
/// the table and keeps the import history.
pub fn import<S: DataStore>(
    store: &mut S,
    table: &Table,
    kind: EntityKind,
    operator_id: UserId,
) -> ImportReport {
    ImportSession::new(store, kind, operator_id).import_table(table)
}
