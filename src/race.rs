//! Supervisor of one race: builds the board and snakes, runs one thread per
//! snake, owns the pause controller and keeps the death ledger.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use tracing::{info, warn};

use crate::concurrency::{
    CancelToken, Cancelled, Canceller, LifecycleListener, PauseController, RunOutcome, SnakeRunner,
};
use crate::game::{Direction, GridBoard, Position, RaceConfig, Snake, SnakeId};

/// Liveness of one snake as seen by the supervisor
#[derive(Debug)]
pub struct SnakeStatus {
    snake: Arc<Snake>,
    alive: AtomicBool,
    death_order: AtomicU64,
}

impl SnakeStatus {
    fn new(snake: Arc<Snake>) -> Self {
        Self {
            snake,
            alive: AtomicBool::new(true),
            death_order: AtomicU64::new(u64::MAX),
        }
    }

    /// Record the death; only the first call for a snake counts
    fn mark_dead(&self, order: u64) -> bool {
        if self
            .alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.death_order.store(order, Ordering::Release);
        true
    }

    pub fn id(&self) -> SnakeId {
        self.snake.id()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// 1 for the first snake to die, 2 for the second, ...
    pub fn death_order(&self) -> Option<u64> {
        match self.death_order.load(Ordering::Acquire) {
            u64::MAX => None,
            order => Some(order),
        }
    }

    pub fn length(&self) -> usize {
        self.snake.len()
    }
}

/// Summary shown while paused
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaceStats {
    /// Longest snake still alive, with its length
    pub longest_alive: Option<(SnakeId, usize)>,
    /// Snake that died first
    pub first_dead: Option<SnakeId>,
    pub alive: usize,
    pub dead: usize,
}

struct DeathLedger {
    statuses: Vec<SnakeStatus>,
    sequence: AtomicU64,
    events: Sender<SnakeId>,
}

impl DeathLedger {
    fn status(&self, id: SnakeId) -> Option<&SnakeStatus> {
        self.statuses.get(id.0).filter(|status| status.id() == id)
    }

    fn stats(&self) -> RaceStats {
        let mut stats = RaceStats::default();
        let mut first_order = u64::MAX;

        for status in &self.statuses {
            if status.is_alive() {
                stats.alive += 1;
                let length = status.length();
                if stats.longest_alive.map_or(true, |(_, best)| length > best) {
                    stats.longest_alive = Some((status.id(), length));
                }
            } else {
                stats.dead += 1;
                if let Some(order) = status.death_order() {
                    if order < first_order {
                        first_order = order;
                        stats.first_dead = Some(status.id());
                    }
                }
            }
        }
        stats
    }
}

impl LifecycleListener for DeathLedger {
    fn on_death(&self, id: SnakeId) {
        let Some(status) = self.status(id) else {
            warn!(snake = %id, "Death reported for unknown snake");
            return;
        };

        let order = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        if status.mark_dead(order) {
            info!(snake = %id, order, length = status.length(), "Snake out of the race");
            // nobody listening is fine
            let _ = self.events.send(id);
        }
    }
}

/// A race of several snakes, each moved by its own thread
pub struct Race {
    config: RaceConfig,
    board: Arc<GridBoard>,
    pause: Arc<PauseController>,
    snakes: Vec<Arc<Snake>>,
    runners: Vec<Arc<SnakeRunner>>,
    handles: Vec<JoinHandle<RunOutcome>>,
    ledger: Arc<DeathLedger>,
    deaths: Receiver<SnakeId>,
    canceller: Canceller,
}

impl Race {
    /// Build the board, the snakes and their runners. Nothing moves until
    /// [`start`](Self::start).
    pub fn new(config: RaceConfig) -> Result<Self> {
        config.validate()?;

        let board = Arc::new(GridBoard::new(
            config.grid_width,
            config.grid_height,
            config.seed,
        ));
        let snakes: Vec<Arc<Snake>> = (0..config.snakes)
            .map(|i| {
                let (head, direction) = Self::start_of(i, config.grid_width, config.grid_height);
                Arc::new(Snake::with_capacity(
                    SnakeId(i),
                    head,
                    direction,
                    config.initial_capacity,
                ))
            })
            .collect();
        for snake in &snakes {
            board.add_snake(Arc::clone(snake));
        }
        board.populate(
            config.obstacles,
            config.mice,
            config.turbo,
            config.teleport_pairs,
        );

        let (events, deaths) = crossbeam_channel::unbounded();
        let ledger = Arc::new(DeathLedger {
            statuses: snakes.iter().cloned().map(SnakeStatus::new).collect(),
            sequence: AtomicU64::new(0),
            events,
        });

        let pause = Arc::new(PauseController::new());
        let canceller = Canceller::new();
        let runners = snakes
            .iter()
            .enumerate()
            .map(|(i, snake)| {
                let listener: Arc<dyn LifecycleListener> = ledger.clone();
                let mut runner = SnakeRunner::new(
                    Arc::clone(snake),
                    board.clone(),
                    Arc::clone(&pause),
                    canceller.token(),
                )
                .with_config(config.runner.clone())
                .with_listener(listener);
                if let Some(seed) = config.seed {
                    runner = runner.with_seed(seed.wrapping_add(i as u64 + 1));
                }
                Arc::new(runner)
            })
            .collect();

        Ok(Self {
            config,
            board,
            pause,
            snakes,
            runners,
            handles: Vec::new(),
            ledger,
            deaths,
            canceller,
        })
    }

    /// Starting cell and heading of the `i`-th snake; the whole offset wraps
    /// so that every start lies on the grid
    fn start_of(i: usize, width: usize, height: usize) -> (Position, Direction) {
        let x = (2 + i * 3) % width;
        let y = (2 + i * 2) % height;
        (
            Position::new(x as i32, y as i32),
            Direction::ALL[i % Direction::ALL.len()],
        )
    }

    /// Spawn one thread per snake
    pub fn start(&mut self) -> Result<()> {
        if !self.handles.is_empty() {
            bail!("race already started");
        }
        if self.canceller.is_cancelled() {
            bail!("race already shut down");
        }

        for runner in &self.runners {
            let runner = Arc::clone(runner);
            let handle = thread::Builder::new()
                .name(format!("snake-{}", runner.snake().id().0))
                .spawn(move || runner.run())
                .context("Failed to spawn snake thread")?;
            self.handles.push(handle);
        }

        info!(
            snakes = self.runners.len(),
            width = self.config.grid_width,
            height = self.config.grid_height,
            "Race started"
        );
        Ok(())
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn board(&self) -> &Arc<GridBoard> {
        &self.board
    }

    pub fn snakes(&self) -> &[Arc<Snake>] {
        &self.snakes
    }

    pub fn pause_controller(&self) -> &Arc<PauseController> {
        &self.pause
    }

    pub fn statuses(&self) -> &[SnakeStatus] {
        &self.ledger.statuses
    }

    /// Turn snake `index` (player steering). Returns whether the turn was accepted.
    pub fn steer(&self, index: usize, direction: Direction) -> bool {
        self.snakes
            .get(index)
            .is_some_and(|snake| snake.turn(direction))
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Pause every runner and block until all of them have stopped
    pub fn pause_and_wait(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        self.pause.pause_all();
        self.pause.await_pause_completion(cancel)
    }

    pub fn resume(&self) {
        self.pause.resume_all();
    }

    pub fn stats(&self) -> RaceStats {
        self.ledger.stats()
    }

    pub fn alive_count(&self) -> usize {
        self.ledger.statuses.iter().filter(|s| s.is_alive()).count()
    }

    /// Death notifications, in the order they happened
    pub fn deaths(&self) -> &Receiver<SnakeId> {
        &self.deaths
    }

    /// Whether every runner thread has returned
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|handle| handle.is_finished())
    }

    /// Cancel all runners and wait for their threads.
    ///
    /// Returns the outcome of every runner that had been started; a runner
    /// whose thread panicked is reported as [`RunOutcome::Failed`].
    pub fn shutdown(&mut self) -> Vec<RunOutcome> {
        self.canceller.cancel();

        let outcomes: Vec<RunOutcome> = self
            .handles
            .drain(..)
            .map(|handle| {
                let name = handle.thread().name().unwrap_or("snake").to_string();
                handle.join().unwrap_or_else(|_| {
                    warn!(thread = %name, "Snake thread panicked");
                    RunOutcome::Failed
                })
            })
            .collect();

        if !outcomes.is_empty() {
            info!(stats = ?self.stats(), "Race shut down");
        }
        outcomes
    }
}

impl Drop for Race {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::RunnerConfig;
    use std::time::Duration;

    const BOUND: Duration = Duration::from_secs(5);

    fn quiet_config(snakes: usize) -> RaceConfig {
        RaceConfig {
            snakes,
            seed: Some(9),
            runner: RunnerConfig {
                base_sleep_ms: 2,
                turbo_sleep_ms: 1,
                turn_probability: 0.0,
                boosted_turn_probability: 0.0,
                ..Default::default()
            },
            ..RaceConfig::small()
        }
    }

    #[test]
    fn test_snakes_are_placed_like_a_starting_grid() {
        let race = Race::new(RaceConfig {
            snakes: 5,
            ..RaceConfig::default()
        })
        .unwrap();

        let heads: Vec<_> = race.snakes().iter().map(|s| s.head()).collect();
        assert_eq!(heads[0], Position::new(2, 2));
        assert_eq!(heads[1], Position::new(5, 4));
        assert_eq!(heads[4], Position::new(14, 10));

        let directions: Vec<_> = race.snakes().iter().map(|s| s.direction()).collect();
        assert_eq!(
            directions,
            vec![
                Direction::Up,
                Direction::Down,
                Direction::Left,
                Direction::Right,
                Direction::Up
            ]
        );
    }

    #[test]
    fn test_start_cells_wrap_onto_small_grids() {
        let race = Race::new(RaceConfig {
            snakes: 4,
            grid_width: 4,
            grid_height: 4,
            ..RaceConfig::small()
        })
        .unwrap();

        let heads: Vec<_> = race.snakes().iter().map(|s| s.head()).collect();
        assert_eq!(
            heads,
            vec![
                Position::new(2, 2),
                Position::new(1, 0),
                Position::new(0, 2),
                Position::new(3, 0),
            ]
        );
    }

    #[test]
    fn test_fresh_race_stats() {
        let race = Race::new(quiet_config(3)).unwrap();
        let stats = race.stats();
        assert_eq!(stats.alive, 3);
        assert_eq!(stats.dead, 0);
        assert_eq!(stats.first_dead, None);
        assert_eq!(stats.longest_alive, Some((SnakeId(0), 1)));
    }

    #[test]
    fn test_ledger_orders_deaths_and_ignores_duplicates() {
        let race = Race::new(quiet_config(3)).unwrap();
        race.ledger.on_death(SnakeId(2));
        race.ledger.on_death(SnakeId(0));
        race.ledger.on_death(SnakeId(2));
        race.ledger.on_death(SnakeId(7));

        let stats = race.stats();
        assert_eq!(stats.first_dead, Some(SnakeId(2)));
        assert_eq!(stats.alive, 1);
        assert_eq!(stats.dead, 2);
        assert_eq!(stats.longest_alive, Some((SnakeId(1), 1)));
        assert_eq!(race.statuses()[2].death_order(), Some(1));
        assert!(race.statuses()[0].death_order().unwrap() > 1);

        let events: Vec<_> = race.deaths().try_iter().collect();
        assert_eq!(events, vec![SnakeId(2), SnakeId(0)]);
    }

    #[test]
    fn test_steering_rejects_reversal() {
        let race = Race::new(quiet_config(2)).unwrap();
        // snake 0 starts facing up
        assert!(!race.steer(0, Direction::Down));
        assert!(race.steer(0, Direction::Left));
        assert!(!race.steer(5, Direction::Left));
    }

    #[test]
    fn test_pause_resume_and_shutdown() {
        let mut race = Race::new(quiet_config(4)).unwrap();
        race.start().unwrap();
        assert!(race.start().is_err());

        race.pause_and_wait(&CancelToken::never()).unwrap();
        assert!(race.is_paused());
        let frozen: Vec<_> = race.snakes().iter().map(|s| s.snapshot()).collect();
        std::thread::sleep(Duration::from_millis(30));
        let still: Vec<_> = race.snakes().iter().map(|s| s.snapshot()).collect();
        assert_eq!(frozen, still);

        race.resume();
        assert!(!race.is_paused());

        let outcomes = race.shutdown();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| *o == RunOutcome::Cancelled));
        assert_eq!(race.pause_controller().active_runners(), 0);
        assert!(race.is_finished());
    }

    #[test]
    fn test_shutdown_while_paused() {
        let mut race = Race::new(quiet_config(3)).unwrap();
        race.start().unwrap();
        race.pause_and_wait(&CancelToken::never()).unwrap();

        let outcomes = race.shutdown();
        assert_eq!(outcomes, vec![RunOutcome::Cancelled; 3]);
        assert!(race.start().is_err());
    }

    #[test]
    fn test_obstacle_ends_a_snake() {
        let mut race = Race::new(quiet_config(2)).unwrap();
        // snake 0 starts at (2, 2) facing up
        race.board().place_obstacle(Position::new(2, 1));
        race.start().unwrap();

        assert_eq!(race.deaths().recv_timeout(BOUND), Ok(SnakeId(0)));
        let stats = race.stats();
        assert_eq!(stats.first_dead, Some(SnakeId(0)));
        assert_eq!(stats.alive, 1);
        assert_eq!(stats.longest_alive.map(|(id, _)| id), Some(SnakeId(1)));

        race.pause_and_wait(&CancelToken::never()).unwrap();
        assert_eq!(race.pause_controller().active_runners(), 1);

        let outcomes = race.shutdown();
        assert_eq!(outcomes, vec![RunOutcome::Died, RunOutcome::Cancelled]);
    }
}
