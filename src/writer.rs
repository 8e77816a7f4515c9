//! One multi-row `INSERT` per batch.
//!
//! The statement is not wrapped in an explicit transaction: a single
//! multi-row insert either lands whole or fails whole, and a failed batch is
//! dropped by the caller.

use std::iter;

use itertools::Itertools;

use crate::{
    error::StoreError,
    mapping::Record,
    store::{Store, quote_identifier},
};

pub struct IngestionWriter<'a> {
    store: &'a dyn Store,
    columns: &'a [String],
}

impl<'a> IngestionWriter<'a> {
    pub fn new(store: &'a dyn Store, columns: &'a [String]) -> Self {
        Self { store, columns }
    }

    /// Inserts `records` into `table`, returning the number of rows written.
    pub fn write(&self, table: &str, records: &[Record]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let sql = insert_statement(table, self.columns, records.len());
        let params = bind_values(self.columns, records);
        self.store.execute(&sql, &params)
    }
}

/// `INSERT INTO "t" ("a", "b") VALUES (?, ?), (?, ?)` for `rows` tuples.
pub fn insert_statement(table: &str, columns: &[String], rows: usize) -> String {
    let tuple = format!(
        "({})",
        iter::repeat_n("?", columns.len()).join(", ")
    );
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_identifier(table),
        columns.iter().map(|c| quote_identifier(c)).join(", "),
        iter::repeat_n(tuple.as_str(), rows).join(", ")
    )
}

/// Values in column order, record after record; absent columns bind `""`.
pub fn bind_values<'r>(columns: &[String], records: &'r [Record]) -> Vec<&'r str> {
    records
        .iter()
        .flat_map(|record| columns.iter().map(|column| record.get(column).unwrap_or("")))
        .collect()
}
