//! Race without a terminal UI.
//!
//! The race runs for a fixed wall-clock duration. At every checkpoint all
//! snakes are paused, the standings are logged, and the race resumes.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info};

use crate::concurrency::CancelToken;
use crate::game::RaceConfig;
use crate::race::{Race, RaceStats};
use crate::render::describe_stats;

pub struct HeadlessMode {
    race: Race,
    duration: Duration,
    checkpoint_every: Duration,
}

impl HeadlessMode {
    pub fn new(config: RaceConfig, duration: Duration, checkpoint_every: Duration) -> Result<Self> {
        Ok(Self {
            race: Race::new(config)?,
            duration,
            checkpoint_every: checkpoint_every.max(Duration::from_millis(1)),
        })
    }

    /// Run until the duration is over or every snake is dead; returns the final standings
    pub fn run(&mut self) -> Result<RaceStats> {
        self.race.start()?;
        let started = Instant::now();
        let mut checkpoints = 0u32;

        while self.race.alive_count() > 0 {
            let Some(left) = self.duration.checked_sub(started.elapsed()) else {
                break;
            };

            match self.race.deaths().recv_timeout(left.min(self.checkpoint_every)) {
                Ok(id) => {
                    debug!(snake = %id, "Death observed");
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            checkpoints += 1;
            self.race
                .pause_and_wait(&CancelToken::never())
                .context("Checkpoint pause was cancelled")?;
            let stats = self.race.stats();
            info!(
                checkpoint = checkpoints,
                alive = stats.alive,
                dead = stats.dead,
                "{}",
                describe_stats(&stats)
            );
            self.race.resume();
        }

        let outcomes = self.race.shutdown();
        let stats = self.race.stats();
        info!(
            runners = outcomes.len(),
            checkpoints,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Final standings: {}",
            describe_stats(&stats)
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_run_accounts_for_every_snake() {
        let config = RaceConfig {
            snakes: 3,
            seed: Some(5),
            ..RaceConfig::small()
        };
        let mut mode =
            HeadlessMode::new(config, Duration::from_millis(200), Duration::from_millis(40))
                .unwrap();

        let stats = mode.run().unwrap();
        assert_eq!(stats.alive + stats.dead, 3);
        assert_eq!(mode.race.pause_controller().active_runners(), 0);
        assert!(mode.race.pause_controller().pause_epoch() >= 1);
    }

    #[test]
    fn test_zero_duration_stops_immediately() {
        let mut mode =
            HeadlessMode::new(RaceConfig::small(), Duration::ZERO, Duration::from_millis(10))
                .unwrap();
        let stats = mode.run().unwrap();
        assert_eq!(stats.alive, 2);
        assert!(mode.race.is_finished());
    }
}
