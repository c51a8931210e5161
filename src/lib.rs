//! # ergast-dl
//!
//! Fetches motorsport statistics from an Ergast-compatible JSON API and turns
//! the deeply nested responses into flat delimited tables.
//!
//! ## Design
//!
//! - **Fetch engine** ([`fetch`]) - one shared HTTP client, bounded retry on
//!   transient failures, `limit`/`offset` pagination and rate-limited batches
//! - **Flatten engine** ([`flatten`]) - stateless explode/flatten/expand steps
//!   over ordered JSON records
//! - **Use cases** ([`ergast`], [`weather`], [`wiki`]) - chain the two engines
//!   into race, result, qualifying, standings and reference tables
//! - **Best effort** - a race, season or page that fails is logged and skipped;
//!   the rest of the data is still produced
//!
//! ## Quick Start
//!
//! ```no_run
//! use ergast_dl::{Config, Ergast, Season};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default().apply_env();
//!     let ergast = Ergast::from_config(&config)?;
//!
//!     let start = Season::new(2021)?;
//!     let races = ergast.race_table(start, start).await;
//!     races.write_delimited(&config.output.table_path("races.csv"), ',')?;
//!
//!     let keys = ergast_dl::ergast::race_keys(&races);
//!     let results = ergast.fetch_race_results(&keys).await;
//!     println!("{} result rows", results.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Ergast API use cases
pub mod ergast;
/// Error types
pub mod error;
/// Fetch engine
pub mod fetch;
/// Flatten/normalize engine
pub mod flatten;
/// Retry logic with exponential backoff
pub mod retry;
/// Flat tables and delimited files
pub mod table;
/// Core entity types
pub mod types;
/// Value helpers
pub mod utils;
/// Weather history collaborator
pub mod weather;
/// Circuit reference collaborator
pub mod wiki;

// Re-export commonly used types
pub use config::{Config, RetryConfig};
pub use ergast::Ergast;
pub use error::{Error, Result};
pub use fetch::{FetchClient, Paginated};
pub use flatten::Record;
pub use table::Table;
pub use types::{Race, RaceKey, Round, Season};
pub use weather::WeatherClient;
