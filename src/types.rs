//! Core entity types for ergast-dl
//!
//! Upstream JSON carries every scalar as a string (`"season": "2021"`); the
//! types here parse those strings once at the edge so absent or malformed keys
//! surface as deserialization errors instead of failed lookups further down.

use chrono::Datelike;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Sentinel written for a field the upstream record does not carry
pub const NOT_AVAILABLE: &str = "N/A";

/// First season of the world championship
pub const FIRST_SEASON: i32 = 1950;

/// A yearly competition cycle, in `[1950, current year]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Season(i32);

impl Season {
    /// Create a season, rejecting years outside `[1950, current year]`
    pub fn new(year: i32) -> Result<Self> {
        let current = current_year();
        if !(FIRST_SEASON..=current).contains(&year) {
            return Err(Error::InvalidInput(format!(
                "season {year} outside {FIRST_SEASON}..={current}"
            )));
        }
        Ok(Self(year))
    }

    /// The current calendar year's season
    pub fn current() -> Self {
        Self(current_year())
    }

    /// Get the inner year
    pub fn get(&self) -> i32 {
        self.0
    }

    /// Every season from `start` to `end`, both inclusive
    pub fn range(start: Season, end: Season) -> impl Iterator<Item = Season> {
        (start.0..=end.0).map(Season)
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Season {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let year = s
            .trim()
            .parse::<i32>()
            .map_err(|e| Error::InvalidInput(format!("season '{s}': {e}")))?;
        Self::new(year)
    }
}

impl<'de> Deserialize<'de> for Season {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = StringOrNumber::deserialize(deserializer)?;
        raw.as_str().parse().map_err(serde::de::Error::custom)
    }
}

/// A numbered event within a season, starting at 1
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Round(u32);

impl Round {
    /// Create a round number; zero is rejected
    pub fn new(round: u32) -> Result<Self> {
        if round == 0 {
            return Err(Error::InvalidInput("round numbers start at 1".into()));
        }
        Ok(Self(round))
    }

    /// Get the inner round number
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Round {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let round = s
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::InvalidInput(format!("round '{s}': {e}")))?;
        Self::new(round)
    }
}

impl<'de> Deserialize<'de> for Round {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = StringOrNumber::deserialize(deserializer)?;
        raw.as_str().parse().map_err(serde::de::Error::custom)
    }
}

/// Natural key of a race
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RaceKey {
    /// Season the race belongs to
    pub season: Season,
    /// Round within the season
    pub round: Round,
}

impl RaceKey {
    /// Create a race key
    pub fn new(season: Season, round: Round) -> Self {
        Self { season, round }
    }

    /// Read `season` and `round` out of a flat record
    pub fn from_record(record: &Map<String, Value>) -> Result<Self> {
        let field = |name: &str| -> Result<String> {
            match record.get(name) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                _ => Err(Error::schema("race row", name)),
            }
        };
        Ok(Self {
            season: field("season")?.parse()?,
            round: field("round")?.parse()?,
        })
    }
}

impl std::fmt::Display for RaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.season, self.round)
    }
}

/// Geographic position of a circuit
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Location {
    /// Town or area
    pub locality: String,
    /// Country name
    pub country: String,
    /// Latitude in decimal degrees, as the upstream wrote it
    #[serde(deserialize_with = "de_coordinate")]
    pub lat: String,
    /// Longitude in decimal degrees, as the upstream wrote it
    #[serde(rename = "long", deserialize_with = "de_coordinate")]
    pub long: String,
}

/// A venue; referenced by races, never owned by them
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Circuit {
    /// Stable identifier (e.g. "bahrain")
    #[serde(rename = "circuitId")]
    pub id: String,
    /// Display name
    #[serde(rename = "circuitName")]
    pub name: String,
    /// Reference page, when provided
    #[serde(default)]
    pub url: Option<String>,
    /// Where the circuit is
    #[serde(rename = "Location")]
    pub location: Location,
}

/// One event of a season
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Race {
    /// Season of the race
    pub season: Season,
    /// Round within the season
    pub round: Round,
    /// Event name
    #[serde(rename = "raceName")]
    pub name: String,
    /// ISO-8601 date
    pub date: String,
    /// Start time; older seasons do not record one
    #[serde(default)]
    pub time: Option<String>,
    /// Venue
    #[serde(rename = "Circuit")]
    pub circuit: Circuit,
}

impl Race {
    /// Natural key of this race
    pub fn key(&self) -> RaceKey {
        RaceKey::new(self.season, self.round)
    }

    /// Flat race row; an absent start time becomes [`NOT_AVAILABLE`]
    pub fn to_record(&self) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("season".into(), Value::String(self.season.to_string()));
        row.insert("round".into(), Value::String(self.round.to_string()));
        row.insert("raceName".into(), Value::String(self.name.clone()));
        row.insert("date".into(), Value::String(self.date.clone()));
        row.insert(
            "time".into(),
            Value::String(
                self.time
                    .clone()
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ),
        );
        row.insert("circuitId".into(), Value::String(self.circuit.id.clone()));
        row.insert("circuit".into(), Value::String(self.circuit.name.clone()));
        row.insert(
            "location".into(),
            Value::String(self.circuit.location.locality.clone()),
        );
        row.insert(
            "country".into(),
            Value::String(self.circuit.location.country.clone()),
        );
        row.insert(
            "long".into(),
            Value::String(self.circuit.location.long.clone()),
        );
        row.insert(
            "lat".into(),
            Value::String(self.circuit.location.lat.clone()),
        );
        row
    }
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// Scalars arrive as strings from the API but as numbers from hand-built inputs
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            StringOrNumber::String(s) => std::borrow::Cow::Borrowed(s),
            StringOrNumber::Number(n) => std::borrow::Cow::Owned(n.to_string()),
        }
    }
}

/// A coordinate must read as a number but is kept verbatim
fn de_coordinate<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    let raw = StringOrNumber::deserialize(deserializer)?;
    let text = raw.as_str();
    text.trim()
        .parse::<f64>()
        .map_err(|e| serde::de::Error::custom(format!("invalid coordinate '{text}': {e}")))?;
    Ok(text.into_owned())
}
