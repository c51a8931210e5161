//! Configuration types for ergast-dl
//!
//! A [`Config`] is built once at program start and handed by reference to the
//! fetch and flatten engines. Nothing in the library reads global state or the
//! environment on its own; [`Config::apply_env`] is the single place where
//! environment overrides are pulled in.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Ergast-compatible API root
pub const DEFAULT_BASE_URL: &str = "https://api.jolpi.ca/ergast/f1";

/// Default weather history endpoint
pub const DEFAULT_WEATHER_URL: &str = "https://api.weatherapi.com/v1/history.json";

/// Default reference page listing Formula One circuits
pub const DEFAULT_REFERENCE_URL: &str = "https://en.wikipedia.org/wiki/List_of_Formula_One_circuits";

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote statistics API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry policy for single fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batched concurrent fetch settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Output location and format
    #[serde(default)]
    pub output: OutputConfig,

    /// Weather history collaborator
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Circuit reference document collaborator
    #[serde(default)]
    pub reference: ReferenceConfig,
}

impl Config {
    /// Load configuration from a JSON file; absent fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables (loading `.env` first if present)
    ///
    /// Recognised variables: `ERGAST_BASE_URL`, `ERGAST_DATA_DIR`, `WEATHER_API_KEY`.
    pub fn apply_env(mut self) -> Self {
        dotenvy::dotenv().ok();

        if let Ok(base_url) = std::env::var("ERGAST_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Ok(dir) = std::env::var("ERGAST_DATA_DIR") {
            self.output.data_dir = PathBuf::from(dir);
        }
        if let Ok(key) = std::env::var("WEATHER_API_KEY") {
            if !key.trim().is_empty() {
                self.weather.api_key = Some(key);
            }
        }
        self
    }

    /// Reject settings that would stall or spin the engines
    pub fn validate(&self) -> Result<()> {
        if self.api.page_size == 0 {
            return Err(Error::config("page size must be at least 1", "api.page_size"));
        }
        if self.batch.batch_size == 0 {
            return Err(Error::config(
                "batch size must be at least 1",
                "batch.batch_size",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "at least one attempt is required",
                "retry.max_attempts",
            ));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(Error::config(
                "initial delay exceeds max delay",
                "retry.initial_delay",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff multiplier must be >= 1.0",
                "retry.backoff_multiplier",
            ));
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config(format!("invalid base URL: {e}"), "api.base_url"))?;
        Ok(())
    }
}

/// Remote statistics API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, without trailing slash (default: [`DEFAULT_BASE_URL`])
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Items requested per page for paginated endpoints (default: 30)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            page_size: default_page_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, first try included (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 4 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Batched concurrent fetch settings
///
/// Batches run strictly one after another; `inter_batch_delay` is slept between
/// two consecutive batches to stay under the upstream rate limit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Requests in flight per batch (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches (default: 5 seconds)
    #[serde(default = "default_inter_batch_delay", with = "duration_serde")]
    pub inter_batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay: default_inter_batch_delay(),
        }
    }
}

/// Output location and format
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the flat tables (default: "data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Field delimiter (default: ',')
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            delimiter: default_delimiter(),
        }
    }
}

impl OutputConfig {
    /// Path of a named table inside the data directory
    pub fn table_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

/// Weather history collaborator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// History endpoint (default: [`DEFAULT_WEATHER_URL`])
    #[serde(default = "default_weather_url")]
    pub base_url: String,

    /// API key; usually supplied through `WEATHER_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request timeout (default: 5 seconds)
    #[serde(default = "default_weather_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            api_key: None,
            timeout: default_weather_timeout(),
        }
    }
}

/// Circuit reference document collaborator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Page holding the circuits table
    #[serde(default = "default_reference_url")]
    pub url: String,

    /// Local copy used when the page cannot be fetched or parsed
    #[serde(default = "default_reference_file")]
    pub local_file: PathBuf,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            url: default_reference_url(),
            local_file: default_reference_file(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_page_size() -> usize {
    30
}

fn default_user_agent() -> String {
    concat!("ergast-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(4)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_batch_size() -> usize {
    10
}

fn default_inter_batch_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_delimiter() -> char {
    ','
}

fn default_weather_url() -> String {
    DEFAULT_WEATHER_URL.to_string()
}

fn default_weather_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_reference_url() -> String {
    DEFAULT_REFERENCE_URL.to_string()
}

fn default_reference_file() -> PathBuf {
    PathBuf::from("data/wiki_circuits.csv")
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
