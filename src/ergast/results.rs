//! Race results and qualifying

use serde_json::Value;

use super::{Ergast, QUALIFYING, RESULTS, first_race, keyed_record};
use crate::error::{Error, Result};
use crate::flatten::{
    Record, explode_nested_list, flatten_nested_object, flatten_nested_object_prefixed,
};
use crate::table::Table;
use crate::types::{NOT_AVAILABLE, RaceKey};

impl Ergast {
    /// Classified results of every race, one row per driver
    ///
    /// Rows carry `season`/`round`, the result fields, the driver fields and
    /// `constructor_*`, `millis`/`time` and `fastestLap_*` columns.
    pub async fn fetch_race_results(&self, races: &[RaceKey]) -> Table {
        let rows = self.collect_per_race(races, RESULTS, results_rows).await;
        Table::from_records(rows)
    }

    /// Qualifying times of every race, one row per driver
    ///
    /// Sessions a driver did not take part in are [`NOT_AVAILABLE`].
    pub async fn fetch_qualifying(&self, races: &[RaceKey]) -> Table {
        let rows = self.collect_per_race(races, QUALIFYING, qualifying_rows).await;
        Table::from_records(rows)
    }
}

pub(crate) fn results_rows(key: RaceKey, body: &Value, url: &str) -> Result<Vec<Record>> {
    let Some(race) = first_race(body, url)? else {
        return Ok(Vec::new());
    };
    let results = race
        .get("Results")
        .cloned()
        .ok_or_else(|| Error::schema(url, "Results"))?;

    let mut record = keyed_record(key);
    record.insert("Results".into(), results);

    let rows = explode_nested_list(vec![record], "Results");
    let rows = flatten_nested_object(rows, "Results");
    let rows = flatten_nested_object(rows, "Driver");
    let rows = flatten_nested_object_prefixed(rows, "Constructor", "constructor");
    let rows = flatten_nested_object(rows, "Time");
    let rows = flatten_nested_object_prefixed(rows, "FastestLap", "fastestLap");
    let rows = flatten_nested_object_prefixed(rows, "fastestLap_Time", "fastestLap");
    let rows = flatten_nested_object_prefixed(rows, "fastestLap_AverageSpeed", "fastestLap_averageSpeed");
    Ok(rows)
}

pub(crate) fn qualifying_rows(key: RaceKey, body: &Value, url: &str) -> Result<Vec<Record>> {
    let Some(race) = first_race(body, url)? else {
        return Ok(Vec::new());
    };
    let entries = race
        .get("QualifyingResults")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::schema(url, "QualifyingResults"))?;

    entries
        .iter()
        .map(|entry| {
            let text = |path: &[&str]| -> Result<Value> {
                let mut current = entry;
                for step in path {
                    current = current.get(*step).ok_or_else(|| Error::schema(url, *step))?;
                }
                Ok(current.clone())
            };
            let session = |name: &str| {
                entry
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| Value::String(NOT_AVAILABLE.to_string()))
            };

            let mut row = keyed_record(key);
            row.insert("driverId".into(), text(&["Driver", "driverId"])?);
            row.insert("driver".into(), text(&["Driver", "familyName"])?);
            row.insert("constructorId".into(), text(&["Constructor", "constructorId"])?);
            row.insert("q1".into(), session("Q1"));
            row.insert("q2".into(), session("Q2"));
            row.insert("q3".into(), session("Q3"));
            Ok(row)
        })
        .collect()
}
