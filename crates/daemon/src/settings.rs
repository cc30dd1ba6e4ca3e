//! Daemon settings
//!
//! Layered with the `config` crate, later sources winning:
//! 1. built-in defaults (the core crate's constants)
//! 2. optional `tidepool.toml` (or the file named by `TIDEPOOL_CONFIG`)
//! 3. `TIDEPOOL_*` environment variables, e.g. `TIDEPOOL_MIN_WORKERS=4`

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use tidepool_core::application::constants::{
    DEFAULT_ITEMS_PER_WORKER, DEFAULT_MIN_WORKERS, DOWNSCALE_COOLDOWN, IDLE_RECHECK_INTERVAL,
};
use tidepool_core::PoolConfig;

pub const DEFAULT_CONFIG_FILE: &str = "tidepool";
const ENV_PREFIX: &str = "TIDEPOOL";

/// Simulated work per item (50ms)
const DEFAULT_WORK_MS: u64 = 50;

/// Stats log interval (5s)
const DEFAULT_STATS_INTERVAL_MS: u64 = 5000;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub min_workers: usize,
    pub items_per_worker: usize,
    pub max_workers: Option<usize>,
    pub downscale_cooldown_ms: u64,
    pub idle_recheck_ms: u64,
    pub work_ms: u64,
    pub stats_interval_ms: u64,
}

impl Settings {
    /// Load defaults, then the config file, then the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("TIDEPOOL_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        with_defaults()?
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn pool_config(&self) -> PoolConfig {
        let config = PoolConfig::new(self.min_workers, self.items_per_worker)
            .with_downscale_cooldown(Duration::from_millis(self.downscale_cooldown_ms))
            .with_idle_recheck(Duration::from_millis(self.idle_recheck_ms));
        match self.max_workers {
            Some(max) => config.with_max_workers(max),
            None => config,
        }
    }

    pub fn work(&self) -> Duration {
        Duration::from_millis(self.work_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms.max(1))
    }
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("min_workers", DEFAULT_MIN_WORKERS as u64)?
        .set_default("items_per_worker", DEFAULT_ITEMS_PER_WORKER as u64)?
        .set_default("downscale_cooldown_ms", DOWNSCALE_COOLDOWN.as_millis() as u64)?
        .set_default("idle_recheck_ms", IDLE_RECHECK_INTERVAL.as_millis() as u64)?
        .set_default("work_ms", DEFAULT_WORK_MS)?
        .set_default("stats_interval_ms", DEFAULT_STATS_INTERVAL_MS)
}
