//! Configuration for the decryption worker pool.

use std::thread::available_parallelism;

use serde::{Deserialize, Serialize};

/// Configuration for decryption jobs.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The number of parallel worker threads.
    ///
    /// When unset, uses one less than the available parallelism, with a
    /// minimum of one worker.
    pub workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self { workers: None }
    }
}

impl Config {
    /// The worker thread count the pool should spawn.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(workers) => workers.max(1),
            None => available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
                .saturating_sub(1)
                .max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_worker_counts_are_respected() {
        let config = Config { workers: Some(4) };
        assert_eq!(config.worker_count(), 4);
    }

    #[test]
    fn worker_counts_never_reach_zero() {
        let config = Config { workers: Some(0) };
        assert_eq!(config.worker_count(), 1);

        let config = Config::default();
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn unknown_config_fields_are_rejected() {
        let parsed: Result<Config, _> = serde_json::from_str(r#"{ "wrokers": 4 }"#);
        assert!(parsed.is_err());
    }
}
