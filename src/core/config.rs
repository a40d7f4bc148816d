//! Engine configuration.

use super::constants::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing, queueing and storage settings for the engine.
///
/// Every field has a default, so a config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Milliseconds between meditation ticks
    pub tick_interval_ms: u64,

    /// Seconds between background saves while meditating
    pub autosave_interval_secs: u64,

    /// How long a breakthrough ritual lasts before the outcome is drawn
    pub ritual_duration_ms: u64,

    /// Pending operations a single player may queue before new ones are rejected
    pub command_queue_capacity: usize,

    /// Lines kept in the per-session meditation log
    pub meditation_log_capacity: usize,

    /// Random seed for reproducible sessions (None = entropy)
    pub rng_seed: Option<u64>,

    /// Directory for save files (None = platform data dir)
    pub save_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            autosave_interval_secs: AUTOSAVE_INTERVAL_SECONDS,
            ritual_duration_ms: RITUAL_DURATION_MS,
            command_queue_capacity: COMMAND_QUEUE_CAPACITY,
            meditation_log_capacity: MEDITATION_LOG_CAPACITY,
            rng_seed: None,
            save_dir: None,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file. A missing file yields the defaults; a
    /// malformed one is an error.
    pub fn load(path: &Path) -> io::Result<Self> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }

    pub fn ritual_duration(&self) -> Duration {
        Duration::from_millis(self.ritual_duration_ms)
    }

    /// Quick config for tests: fixed seed, everything else default.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
            ..Default::default()
        }
    }
}
