//! Ergast API use cases
//!
//! [`Ergast`] chains the fetch engine and the flatten engine into the tables
//! the CLI writes: the race calendar, per-race results, qualifying and
//! standings, plus the paginated driver and circuit lists.
//!
//! Per-race fetches are batched through [`FetchClient::fetch_concurrent`]. A
//! race that fails to fetch or does not have the expected shape is logged with
//! its season/round and skipped; the remaining races still produce rows.

mod races;
mod reference;
mod results;
mod standings;

pub use races::race_keys;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::fetch::{ENVELOPE, FetchClient, json_at};
use crate::flatten::Record;
use crate::types::{RaceKey, Season};

/// Per-race results resource
pub const RESULTS: &str = "results";
/// Per-race qualifying resource
pub const QUALIFYING: &str = "qualifying";
/// Driver standings after a race
pub const DRIVER_STANDINGS: &str = "driverStandings";
/// Constructor standings after a race
pub const CONSTRUCTOR_STANDINGS: &str = "constructorStandings";
/// Paginated driver list
pub const DRIVERS: &str = "drivers";
/// Paginated circuit list
pub const CIRCUITS: &str = "circuits";

/// `{season}.json`
pub fn season_path(season: Season) -> String {
    format!("{season}.json")
}

/// `{season}/{round}/{resource}.json`
pub fn race_path(key: RaceKey, resource: &str) -> String {
    format!("{}/{}/{resource}.json", key.season, key.round)
}

/// Ergast use cases over a shared [`FetchClient`]
#[derive(Clone, Debug)]
pub struct Ergast {
    client: FetchClient,
}

impl Ergast {
    /// Wrap an existing client
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }

    /// Build the client from the process configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(FetchClient::from_config(config)?))
    }

    /// The underlying fetch engine
    pub fn client(&self) -> &FetchClient {
        &self.client
    }

    /// Fetch `resource` for every race and turn each response into rows
    ///
    /// `extract` receives the race key and the response body. Fetch failures and
    /// extraction errors are logged and the race is skipped.
    async fn collect_per_race<F>(&self, races: &[RaceKey], resource: &str, extract: F) -> Vec<Record>
    where
        F: Fn(RaceKey, &Value, &str) -> Result<Vec<Record>>,
    {
        let requests: Vec<(RaceKey, String)> = races
            .iter()
            .map(|key| (*key, self.client.url(&race_path(*key, resource))))
            .collect();
        let urls: Vec<String> = requests.iter().map(|(_, url)| url.clone()).collect();

        let responses = self
            .client
            .fetch_concurrent(requests, self.client.batch().batch_size)
            .await;

        let mut rows = Vec::new();
        for ((key, response), url) in responses.into_iter().zip(urls) {
            let season = key.season.get();
            let round = key.round.get();
            let body = match response {
                Ok(body) => body,
                Err(e) => {
                    warn!(season, round, resource, kind = e.code(), error = %e, "Skipping race");
                    continue;
                }
            };
            match extract(key, &body, &url) {
                Ok(found) => {
                    debug!(season, round, resource, rows = found.len(), "Race processed");
                    rows.extend(found);
                }
                Err(e) => {
                    warn!(season, round, resource, kind = e.code(), error = %e, "Skipping race");
                }
            }
        }
        rows
    }
}

/// The single race object of a per-race response, or `None` when `Races` is empty
fn first_race<'v>(body: &'v Value, url: &str) -> Result<Option<&'v Map<String, Value>>> {
    let races = json_at(body, &[ENVELOPE, "RaceTable", "Races"], url)?;
    Ok(races
        .as_array()
        .and_then(|races| races.first())
        .and_then(Value::as_object))
}

/// The single standings list of a standings response, or `None` when empty
fn first_standings_list<'v>(body: &'v Value, url: &str) -> Result<Option<&'v Map<String, Value>>> {
    let lists = json_at(body, &[ENVELOPE, "StandingsTable", "StandingsLists"], url)?;
    Ok(lists
        .as_array()
        .and_then(|lists| lists.first())
        .and_then(Value::as_object))
}

/// Start a row carrying the race's season and round
fn keyed_record(key: RaceKey) -> Record {
    let mut record = Record::new();
    record.insert("season".into(), Value::String(key.season.to_string()));
    record.insert("round".into(), Value::String(key.round.to_string()));
    record
}
