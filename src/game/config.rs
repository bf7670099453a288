use std::path::Path;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use super::state::DEFAULT_CAPACITY;

/// Timing and steering policy of a single snake runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Sleep between ticks at normal speed, in milliseconds
    pub base_sleep_ms: u64,
    /// Sleep between ticks while a turbo boost is active, in milliseconds
    pub turbo_sleep_ms: u64,
    /// Number of ticks a turbo pickup stays active
    pub turbo_ticks: u32,
    /// Chance per tick of a random turn at normal speed
    pub turn_probability: f64,
    /// Chance per tick of a random turn while boosted
    pub boosted_turn_probability: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_sleep_ms: 80,
            turbo_sleep_ms: 40,
            turbo_ticks: 100,
            turn_probability: 0.10,
            boosted_turn_probability: 0.05,
        }
    }
}

impl RunnerConfig {
    pub fn base_sleep(&self) -> Duration {
        Duration::from_millis(self.base_sleep_ms)
    }

    pub fn turbo_sleep(&self) -> Duration {
        Duration::from_millis(self.turbo_sleep_ms)
    }

    /// Steering probability for the given boost state, clamped to [0, 1]
    pub fn turn_probability(&self, boosted: bool) -> f64 {
        let p = if boosted {
            self.boosted_turn_probability
        } else {
            self.turn_probability
        };
        p.clamp(0.0, 1.0)
    }
}

/// Configuration for a race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Width of the game grid
    pub grid_width: usize,
    /// Height of the game grid
    pub grid_height: usize,
    /// Number of snakes, each with its own runner thread
    pub snakes: usize,
    /// Capacity every snake starts with
    pub initial_capacity: usize,

    // Board contents
    pub obstacles: usize,
    pub mice: usize,
    pub turbo: usize,
    pub teleport_pairs: usize,

    /// Seed for board generation and steering; entropy when absent
    pub seed: Option<u64>,

    pub runner: RunnerConfig,
}

/// Largest grid side; positions are `i32`, so every side must fit one
pub const MAX_GRID_SIDE: usize = i32::MAX as usize;

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            grid_width: 35,
            grid_height: 28,
            snakes: 2,
            initial_capacity: DEFAULT_CAPACITY,
            obstacles: 8,
            mice: 6,
            turbo: 3,
            teleport_pairs: 2,
            seed: None,
            runner: RunnerConfig::default(),
        }
    }
}

impl RaceConfig {
    /// Create a new configuration with custom grid size
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            grid_width: width,
            grid_height: height,
            ..Default::default()
        }
    }

    /// Create a small, empty grid for testing
    pub fn small() -> Self {
        Self {
            obstacles: 0,
            mice: 0,
            turbo: 0,
            teleport_pairs: 0,
            ..Self::new(10, 10)
        }
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: RaceConfig =
            serde_json::from_str(&json).context("Failed to deserialize config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.grid_width > 0 && self.grid_height > 0,
            "grid must be at least 1x1, got {}x{}",
            self.grid_width,
            self.grid_height
        );
        ensure!(
            self.grid_width <= MAX_GRID_SIDE && self.grid_height <= MAX_GRID_SIDE,
            "grid sides must not exceed {}, got {}x{}",
            MAX_GRID_SIDE,
            self.grid_width,
            self.grid_height
        );
        ensure!(self.initial_capacity > 0, "initial capacity must be positive");

        let Some(cells) = self.grid_width.checked_mul(self.grid_height) else {
            bail!("grid {}x{} has too many cells", self.grid_width, self.grid_height);
        };
        let items = self
            .teleport_pairs
            .checked_mul(2)
            .and_then(|n| n.checked_add(self.snakes))
            .and_then(|n| n.checked_add(self.obstacles))
            .and_then(|n| n.checked_add(self.mice))
            .and_then(|n| n.checked_add(self.turbo));
        let Some(items) = items else {
            bail!("item counts are too large");
        };
        ensure!(
            items <= cells,
            "{} snakes and items do not fit on a {}x{} grid",
            items,
            self.grid_width,
            self.grid_height
        );
        Ok(())
    }
}
