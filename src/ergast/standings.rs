//! Championship standings after each race

use serde_json::Value;

use super::{CONSTRUCTOR_STANDINGS, DRIVER_STANDINGS, Ergast, first_standings_list, keyed_record};
use crate::error::{Error, Result};
use crate::flatten::{
    Record, explode_nested_list, flatten_nested_object, flatten_nested_object_prefixed,
    spread_nested_list,
};
use crate::table::Table;
use crate::types::RaceKey;

impl Ergast {
    /// Driver standings as of every race; one row per driver
    ///
    /// The first team is promoted as `constructor_*`; a driver who raced for
    /// several teams in a season gets `constructor_2_*` and so on.
    pub async fn fetch_driver_standings(&self, races: &[RaceKey]) -> Table {
        let rows = self
            .collect_per_race(races, DRIVER_STANDINGS, |key, body, url| {
                standings_rows(key, body, url, "DriverStandings")
            })
            .await;
        Table::from_records(rows)
    }

    /// Constructor standings as of every race; one row per team
    pub async fn fetch_constructor_standings(&self, races: &[RaceKey]) -> Table {
        let rows = self
            .collect_per_race(races, CONSTRUCTOR_STANDINGS, |key, body, url| {
                standings_rows(key, body, url, "ConstructorStandings")
            })
            .await;
        Table::from_records(rows)
    }
}

/// Flatten one standings list into rows
///
/// `entries` names the ranked list inside the standings list (`DriverStandings`
/// or `ConstructorStandings`). Season and round come from the list itself and
/// fall back to the requested race.
pub(crate) fn standings_rows(
    key: RaceKey,
    body: &Value,
    url: &str,
    entries: &str,
) -> Result<Vec<Record>> {
    let Some(list) = first_standings_list(body, url)? else {
        return Ok(Vec::new());
    };
    if !list.contains_key(entries) {
        return Err(Error::schema(url, entries));
    }

    let mut record = keyed_record(key);
    for (field, value) in list {
        record.insert(field.clone(), value.clone());
    }

    let rows = explode_nested_list(vec![record], entries);
    let rows = flatten_nested_object(rows, entries);
    let rows = flatten_nested_object(rows, "Driver");
    let rows = spread_nested_list(rows, "Constructors", "constructor");
    let rows = flatten_nested_object_prefixed(rows, "Constructor", "constructor");
    Ok(rows)
}
