//! Race calendar

use serde_json::Value;
use tracing::{info, warn};

use super::{Ergast, season_path};
use crate::error::Result;
use crate::fetch::{ENVELOPE, json_at};
use crate::table::Table;
use crate::types::{Race, RaceKey, Season};

impl Ergast {
    /// Every race of the seasons `start..=end`
    ///
    /// One request per season. A season that cannot be fetched, or a race entry
    /// that does not parse, is logged and skipped.
    pub async fn fetch_race_info(&self, start: Season, end: Season) -> Vec<Race> {
        let requests: Vec<(Season, String)> = Season::range(start, end)
            .map(|season| (season, self.client.url(&season_path(season))))
            .collect();

        let responses = self
            .client
            .fetch_concurrent(requests, self.client.batch().batch_size)
            .await;

        let mut races = Vec::new();
        for (season, response) in responses {
            let parsed = response.and_then(|body| {
                let url = self.client.url(&season_path(season));
                parse_races(&body, &url)
            });
            match parsed {
                Ok(found) => {
                    info!(season = season.get(), races = found.len(), "Season calendar fetched");
                    races.extend(found);
                }
                Err(e) => {
                    warn!(season = season.get(), kind = e.code(), error = %e, "Skipping season");
                }
            }
        }
        races
    }

    /// The flat race table for `start..=end`
    pub async fn race_table(&self, start: Season, end: Season) -> Table {
        race_rows(&self.fetch_race_info(start, end).await)
    }
}

/// Parse the `Races` list of a season response
///
/// The list itself must be present; single entries that fail to parse are skipped.
pub(crate) fn parse_races(body: &Value, url: &str) -> Result<Vec<Race>> {
    let items = json_at(body, &[ENVELOPE, "RaceTable", "Races"], url)?;
    let items = items.as_array().map(Vec::as_slice).unwrap_or_default();

    let races = items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Race>(item.clone()) {
            Ok(race) => Some(race),
            Err(e) => {
                warn!(url = %url, error = %e, "Skipping malformed race entry");
                None
            }
        })
        .collect();
    Ok(races)
}

/// Flat race rows in calendar order
pub fn race_rows(races: &[Race]) -> Table {
    Table::from_records(races.iter().map(Race::to_record).collect())
}

/// Race keys of a race table; rows without a valid season/round are skipped
pub fn race_keys(table: &Table) -> Vec<RaceKey> {
    table
        .rows()
        .iter()
        .filter_map(|row| match RaceKey::from_record(row) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "Race row without a usable key");
                None
            }
        })
        .collect()
}
