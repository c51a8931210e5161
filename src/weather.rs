//! Weather history for race days
//!
//! One request per race against a history endpoint keyed by coordinates and
//! date. Each answer is reduced to a one-row daily summary that is joined back
//! onto the race table by `(date, lat, long)`.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::config::{ApiConfig, BatchConfig, Config, RetryConfig, WeatherConfig};
use crate::error::{Error, Result};
use crate::fetch::{FetchClient, json_at, redact_url};
use crate::flatten::{Record, cell_text};
use crate::table::Table;

/// Columns joining weather onto races
pub const JOIN_KEYS: [&str; 3] = ["date", "lat", "long"];

/// Day fields copied into the summary row
const DAY_FIELDS: [&str; 6] = [
    "maxtemp_c",
    "mintemp_c",
    "avgtemp_c",
    "totalprecip_mm",
    "avghumidity",
    "maxwind_kph",
];

/// Where and when a race took place
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaceDay {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Latitude as written in the race table
    pub lat: String,
    /// Longitude as written in the race table
    pub long: String,
}

impl std::fmt::Display for RaceDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({},{})", self.date, self.lat, self.long)
    }
}

/// Client for the weather history collaborator
#[derive(Clone, Debug)]
pub struct WeatherClient {
    client: FetchClient,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    /// Create a client
    ///
    /// # Errors
    /// [`Error::Config`] when no API key is configured
    pub fn new(config: &WeatherConfig, retry: RetryConfig, batch: BatchConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("weather API key is not set", "weather.api_key"))?;

        let api = ApiConfig {
            base_url: config.base_url.clone(),
            timeout: config.timeout,
            ..ApiConfig::default()
        };
        Ok(Self {
            client: FetchClient::new(&api, retry)?.with_batch(batch),
            base_url: config.base_url.clone(),
            api_key,
        })
    }

    /// Create a client from the process configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.weather, config.retry.clone(), config.batch.clone())
    }

    /// `{base}?key=..&q={lat},{long}&dt={date}`
    ///
    /// # Errors
    /// [`Error::InvalidInput`] for a date not in `YYYY-MM-DD` form or non-numeric coordinates
    pub fn history_url(&self, day: &RaceDay) -> Result<String> {
        NaiveDate::parse_from_str(&day.date, "%Y-%m-%d").map_err(|_| {
            Error::InvalidInput(format!(
                "invalid date '{}', expected YYYY-MM-DD",
                day.date
            ))
        })?;
        for coordinate in [&day.lat, &day.long] {
            coordinate.trim().parse::<f64>().map_err(|_| {
                Error::InvalidInput(format!("invalid coordinate '{coordinate}'"))
            })?;
        }

        let location = format!("{},{}", day.lat.trim(), day.long.trim());
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("key", self.api_key.as_str()),
                ("q", location.as_str()),
                ("dt", day.date.as_str()),
            ],
        )
        .map_err(|e| Error::InvalidInput(format!("invalid weather URL: {e}")))?;
        Ok(url.into())
    }

    /// Daily summary for one race day
    pub async fn fetch_day(&self, day: &RaceDay) -> Result<Record> {
        let url = self.history_url(day)?;
        let body = self.client.fetch_with_retry(&url).await?;
        summary_row(day, &body, &redact_url(&url))
    }

    /// Daily summaries for every usable row of a race table
    ///
    /// Rows without a valid date or coordinates, and days that fail to fetch,
    /// are logged and left out.
    pub async fn fetch_race_weather(&self, races: &Table) -> Table {
        let mut requests = Vec::new();
        for day in race_days(races) {
            match self.history_url(&day) {
                Ok(url) => requests.push((day, url)),
                Err(e) => warn!(day = %day, error = %e, "Skipping race day"),
            }
        }
        let urls: Vec<String> = requests.iter().map(|(_, url)| redact_url(url)).collect();

        let responses = self
            .client
            .fetch_concurrent(requests, self.client.batch().batch_size)
            .await;

        let mut rows = Vec::new();
        for ((day, response), url) in responses.into_iter().zip(urls) {
            match response.and_then(|body| summary_row(&day, &body, &url)) {
                Ok(row) => rows.push(row),
                Err(e) => warn!(day = %day, kind = e.code(), error = %e, "No weather for race day"),
            }
        }

        info!(days = rows.len(), "Weather fetched");
        Table::from_records(rows)
    }
}

/// Race days of a race table, in table order
pub fn race_days(races: &Table) -> Vec<RaceDay> {
    races
        .rows()
        .iter()
        .filter_map(|row| {
            let field = |name: &str| row.get(name).map(cell_text).filter(|s| !s.is_empty());
            Some(RaceDay {
                date: field("date")?,
                lat: field("lat")?,
                long: field("long")?,
            })
        })
        .collect()
}

/// Reduce a history response to `date, lat, long, <day fields>, condition`
pub fn summary_row(day: &RaceDay, body: &Value, url: &str) -> Result<Record> {
    let days = json_at(body, &["forecast", "forecastday"], url)?;
    let summary = days
        .get(0)
        .and_then(|d| d.get("day"))
        .ok_or_else(|| Error::schema(url, "forecastday[0].day"))?;

    let mut row = Record::new();
    row.insert("date".into(), Value::String(day.date.clone()));
    row.insert("lat".into(), Value::String(day.lat.clone()));
    row.insert("long".into(), Value::String(day.long.clone()));
    for field in DAY_FIELDS {
        row.insert(field.into(), summary.get(field).cloned().unwrap_or(Value::Null));
    }
    let condition = summary
        .get("condition")
        .and_then(|c| c.get("text"))
        .cloned()
        .unwrap_or(Value::Null);
    row.insert("condition".into(), condition);
    Ok(row)
}

/// Left-join weather summaries onto race rows by `(date, lat, long)`
pub fn join_weather(races: Table, weather: &Table) -> Table {
    races.left_join(weather, &JOIN_KEYS)
}
