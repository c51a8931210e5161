//! ergast-dl - command-line entry point
//!
//! Each subcommand fetches one family of tables and writes it under the data
//! directory. Per-race commands reuse `races.csv` when it already covers the
//! requested seasons and fetch the calendar first otherwise.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ergast_dl::ergast::race_keys;
use ergast_dl::weather::join_weather;
use ergast_dl::wiki::fetch_wiki_circuits;
use ergast_dl::{Config, Ergast, RaceKey, Season, Table, WeatherClient};

const RACES_FILE: &str = "races.csv";
const RESULTS_FILE: &str = "race_results.csv";
const QUALIFYING_FILE: &str = "qualifying.csv";
const DRIVER_STANDINGS_FILE: &str = "driver_standings.csv";
const CONSTRUCTOR_STANDINGS_FILE: &str = "constructor_standings.csv";
const DRIVERS_FILE: &str = "drivers.csv";
const CIRCUITS_FILE: &str = "circuits.csv";
const WEATHER_FILE: &str = "weather.csv";
const WIKI_CIRCUITS_FILE: &str = "wiki_circuits.csv";

/// Command-line arguments for ergast-dl
#[derive(Parser, Debug)]
#[command(name = "ergast-dl")]
#[command(about = "Download Formula One statistics into flat CSV tables")]
#[command(version)]
struct Cli {
    /// First season (default: current season)
    #[arg(long, global = true)]
    start: Option<i32>,

    /// Last season (default: same as --start)
    #[arg(long, global = true)]
    end: Option<i32>,

    /// JSON configuration file
    #[arg(long, global = true, env = "ERGAST_CONFIG")]
    config: Option<PathBuf>,

    /// Output directory, overrides the configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Race calendar
    Races,
    /// Classified results per race
    Results,
    /// Qualifying times per race
    Qualifying,
    /// Driver standings after each race
    DriverStandings,
    /// Constructor standings after each race
    ConstructorStandings,
    /// Every driver
    Drivers,
    /// Every circuit
    Circuits,
    /// Race-day weather joined onto the calendar
    Weather,
    /// Circuit reference table
    WikiCircuits,
    /// Everything above
    All,
}

struct App {
    config: Config,
    ergast: Ergast,
    start: Season,
    end: Season,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ergast_dl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let app = App::new(&cli)?;

    info!(
        start = app.start.get(),
        end = app.end.get(),
        data_dir = %app.config.output.data_dir.display(),
        command = ?cli.command,
        "Starting"
    );

    match cli.command {
        Command::Races => {
            app.fetch_races().await?;
        }
        Command::Results => app.results().await?,
        Command::Qualifying => app.qualifying().await?,
        Command::DriverStandings => app.driver_standings().await?,
        Command::ConstructorStandings => app.constructor_standings().await?,
        Command::Drivers => app.drivers().await?,
        Command::Circuits => app.circuits().await?,
        Command::Weather => app.weather().await?,
        Command::WikiCircuits => app.wiki_circuits().await?,
        Command::All => app.all().await?,
    }

    info!("Done");
    Ok(())
}

/// Rows of `stored` within `start..=end`, or `None` unless every season in the range has a race
fn seasons_in_range(stored: Table, start: Season, end: Season) -> Option<Table> {
    let in_range: Vec<_> = stored
        .into_records()
        .into_iter()
        .filter(|row| {
            RaceKey::from_record(row)
                .map(|key| key.season >= start && key.season <= end)
                .unwrap_or(false)
        })
        .collect();

    let covered = Season::range(start, end).all(|season| {
        in_range
            .iter()
            .any(|row| RaceKey::from_record(row).is_ok_and(|key| key.season == season))
    });
    covered.then(|| Table::from_records(in_range))
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        }
        .apply_env();
        if let Some(dir) = &cli.data_dir {
            config.output.data_dir = dir.clone();
        }
        config.validate().context("Invalid configuration")?;

        let start = match cli.start {
            Some(year) => Season::new(year).context("Invalid --start")?,
            None => Season::current(),
        };
        let end = match cli.end {
            Some(year) => Season::new(year).context("Invalid --end")?,
            None => start,
        };
        anyhow::ensure!(start <= end, "--start {start} is after --end {end}");

        let ergast = Ergast::from_config(&config).context("Failed to create API client")?;
        Ok(Self {
            config,
            ergast,
            start,
            end,
        })
    }

    fn write(&self, file_name: &str, table: &Table) -> Result<()> {
        let path = self.config.output.table_path(file_name);
        table
            .write_delimited(&path, self.config.output.delimiter)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Fetch the calendar and write `races.csv`
    async fn fetch_races(&self) -> Result<Table> {
        let races = self.ergast.race_table(self.start, self.end).await;
        self.write(RACES_FILE, &races)?;
        Ok(races)
    }

    /// Calendar rows for the requested seasons, from disk when possible
    async fn races(&self) -> Result<Table> {
        let path = self.config.output.table_path(RACES_FILE);
        if path.exists() {
            let stored = Table::read_delimited(&path, self.config.output.delimiter)
                .with_context(|| format!("Failed to read {}", path.display()))?
                .remove_unnamed_columns();
            match seasons_in_range(stored, self.start, self.end) {
                Some(in_range) => {
                    info!(path = %path.display(), races = in_range.len(), "Using stored race calendar");
                    return Ok(in_range);
                }
                None => {
                    info!(path = %path.display(), "Stored race calendar misses requested seasons");
                }
            }
        }
        self.fetch_races().await
    }

    async fn results(&self) -> Result<()> {
        let keys = race_keys(&self.races().await?);
        let table = self.ergast.fetch_race_results(&keys).await.with_race_id();
        self.write(RESULTS_FILE, &table)
    }

    async fn qualifying(&self) -> Result<()> {
        let keys = race_keys(&self.races().await?);
        let table = self.ergast.fetch_qualifying(&keys).await.with_race_id();
        self.write(QUALIFYING_FILE, &table)
    }

    async fn driver_standings(&self) -> Result<()> {
        let keys = race_keys(&self.races().await?);
        let table = self.ergast.fetch_driver_standings(&keys).await.with_race_id();
        self.write(DRIVER_STANDINGS_FILE, &table)
    }

    async fn constructor_standings(&self) -> Result<()> {
        let keys = race_keys(&self.races().await?);
        let table = self
            .ergast
            .fetch_constructor_standings(&keys)
            .await
            .with_race_id();
        self.write(CONSTRUCTOR_STANDINGS_FILE, &table)
    }

    async fn drivers(&self) -> Result<()> {
        let (table, failure) = self.ergast.fetch_all_drivers(self.config.api.page_size).await;
        if let Some(e) = failure {
            warn!(error = %e, rows = table.len(), "Driver list is incomplete");
        }
        self.write(DRIVERS_FILE, &table)
    }

    async fn circuits(&self) -> Result<()> {
        let (table, failure) = self.ergast.fetch_all_circuits(self.config.api.page_size).await;
        if let Some(e) = failure {
            warn!(error = %e, rows = table.len(), "Circuit list is incomplete");
        }
        self.write(CIRCUITS_FILE, &table)
    }

    async fn weather(&self) -> Result<()> {
        let client = WeatherClient::from_config(&self.config)
            .context("Weather API is not configured (set WEATHER_API_KEY)")?;
        let races = self.races().await?;
        let weather = client.fetch_race_weather(&races).await;
        let joined = join_weather(races, &weather).with_race_id();
        self.write(WEATHER_FILE, &joined)
    }

    async fn wiki_circuits(&self) -> Result<()> {
        let table = fetch_wiki_circuits(
            self.ergast.client(),
            &self.config.reference,
            self.config.output.delimiter,
        )
        .await
        .context("Circuit reference table unavailable")?;
        self.write(WIKI_CIRCUITS_FILE, &table)
    }

    async fn all(&self) -> Result<()> {
        self.fetch_races().await?;
        self.results().await?;
        self.qualifying().await?;
        self.driver_standings().await?;
        self.constructor_standings().await?;
        self.drivers().await?;
        self.circuits().await?;

        if self.config.weather.api_key.is_some() {
            self.weather().await?;
        } else {
            warn!("WEATHER_API_KEY not set, skipping weather");
        }
        if let Err(e) = self.wiki_circuits().await {
            warn!(error = %e, "Skipping circuit reference table");
        }
        Ok(())
    }
}
