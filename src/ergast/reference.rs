//! Paginated driver and circuit lists

use serde_json::Value;

use super::{CIRCUITS, DRIVERS, Ergast};
use crate::error::Error;
use crate::fetch::Paginated;
use crate::flatten::{Record, flatten_nested_object};
use crate::table::Table;

impl Ergast {
    /// Every driver in the database
    ///
    /// A page failure ends the walk; the rows gathered so far are returned with the error.
    pub async fn fetch_all_drivers(&self, page_size: usize) -> (Table, Option<Error>) {
        let Paginated { items, failure, .. } = self.client.fetch_paginated(DRIVERS, page_size).await;
        (Table::from_records(records(items)), failure)
    }

    /// Every circuit, with `Location` promoted to `locality`, `country`, `lat`, `long`
    pub async fn fetch_all_circuits(&self, page_size: usize) -> (Table, Option<Error>) {
        let Paginated { items, failure, .. } =
            self.client.fetch_paginated(CIRCUITS, page_size).await;
        let rows = flatten_nested_object(records(items), "Location");
        (Table::from_records(rows), failure)
    }
}

fn records(items: Vec<Value>) -> Vec<Record> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}
