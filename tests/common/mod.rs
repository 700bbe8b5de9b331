#![allow(dead_code)]

pub mod wiremock_helpers;

use contact_harvester::config::Config;
use std::path::Path;
use std::time::Duration;

/// Configuration with short timeouts, writing into `results_dir`.
pub fn test_config(results_dir: &Path) -> Config {
    Config {
        request_timeout: Duration::from_secs(3),
        contact_page_timeout: Duration::from_secs(2),
        results_dir: results_dir.to_path_buf(),
        history_file: None,
        ..Config::default()
    }
}

/// An address nothing listens on.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1";
