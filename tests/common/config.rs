//! Test configuration helpers pointing the library at a mock server

use std::time::Duration;

use ergast_dl::config::{BatchConfig, RetryConfig};
use ergast_dl::{Config, Ergast};
use tempfile::TempDir;
use wiremock::MockServer;

/// Configuration for a mock upstream with fast retries, no batch pause and a temp data dir
pub fn test_config(server: &MockServer, data_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.batch = BatchConfig {
        batch_size: 2,
        inter_batch_delay: Duration::ZERO,
    };
    config.output.data_dir = data_dir.path().to_path_buf();
    config
}

/// Ergast use cases against `server`, plus the temp dir that backs the output
pub fn create_test_ergast(server: &MockServer) -> (Ergast, Config, TempDir) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let config = test_config(server, &dir);
    let ergast = Ergast::from_config(&config).unwrap_or_else(|e| panic!("client: {e}"));
    (ergast, config, dir)
}
