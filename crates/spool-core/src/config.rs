//! Spool configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::app::WorkerConfig;

/// Where the stores live and how the worker idles.
#[derive(Debug, Clone)]
pub struct SpoolConfig {
    /// Directory holding both store files
    pub data_dir: PathBuf,
    /// Queue file name inside `data_dir`
    pub queue_file: String,
    /// Results file name inside `data_dir`
    pub results_file: String,
    /// Worker wait between polls of an empty queue
    pub idle_interval: Duration,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("db"),
            queue_file: "queue.jsonl".to_string(),
            results_file: "results.json".to_string(),
            idle_interval: Duration::from_secs(1),
        }
    }
}

impl SpoolConfig {
    /// Create config from environment variables.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("SPOOL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            queue_file: std::env::var("SPOOL_QUEUE_FILE").unwrap_or(defaults.queue_file),
            results_file: std::env::var("SPOOL_RESULTS_FILE").unwrap_or(defaults.results_file),
            idle_interval: std::env::var("SPOOL_IDLE_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_interval),
        }
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join(&self.queue_file)
    }

    pub fn results_path(&self) -> PathBuf {
        self.data_dir.join(&self.results_file)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            idle_interval: self.idle_interval,
        }
    }
}
