use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, info_span};

use super::cancel::{CancelToken, Cancelled};
use super::pause::{PauseController, RunnerRegistration};
use crate::game::{Board, Direction, MoveResult, RunnerConfig, Snake, SnakeId};

/// Receives lifecycle events of snakes
pub trait LifecycleListener: Send + Sync {
    /// Called at most once per snake, from the thread that detected the death
    fn on_death(&self, id: SnakeId);
}

impl<F> LifecycleListener for F
where
    F: Fn(SnakeId) + Send + Sync,
{
    fn on_death(&self, id: SnakeId) {
        self(id)
    }
}

/// Why [`SnakeRunner::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The snake hit an obstacle or was killed from outside
    Died,
    /// The runner's token was cancelled
    Cancelled,
    /// The board failed to resolve a move; the snake was killed
    Failed,
}

/// Drives one snake on its own thread until it dies or is cancelled
pub struct SnakeRunner {
    snake: Arc<Snake>,
    board: Arc<dyn Board>,
    pause: Arc<PauseController>,
    listener: Option<Arc<dyn LifecycleListener>>,
    config: RunnerConfig,
    cancel: CancelToken,
    seed: Option<u64>,
    alive: AtomicBool,
}

impl SnakeRunner {
    pub fn new(
        snake: Arc<Snake>,
        board: Arc<dyn Board>,
        pause: Arc<PauseController>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            snake,
            board,
            pause,
            listener: None,
            config: RunnerConfig::default(),
            cancel,
            seed: None,
            alive: AtomicBool::new(true),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the steering RNG; entropy is used otherwise
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn snake(&self) -> &Arc<Snake> {
        &self.snake
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Run the tick loop on the calling thread.
    ///
    /// The runner is registered with the pause controller for exactly the
    /// duration of this call, whatever way it ends.
    pub fn run(&self) -> RunOutcome {
        let span = info_span!("runner", snake = %self.snake.id());
        let _enter = span.enter();

        let registration = self.pause.register_runner();
        let mut rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let outcome = self
            .tick_loop(&registration, &mut rng)
            .unwrap_or(RunOutcome::Cancelled);
        registration.deregister();

        info!(?outcome, length = self.snake.len(), "Runner finished");
        outcome
    }

    fn tick_loop(
        &self,
        registration: &RunnerRegistration,
        rng: &mut SmallRng,
    ) -> Result<RunOutcome, Cancelled> {
        let mut turbo_ticks: u32 = 0;

        while self.is_alive() {
            self.cancel.check()?;
            self.pause.await_if_paused(registration, &self.cancel)?;
            self.maybe_turn(turbo_ticks > 0, rng);

            match self.board.step(&self.snake) {
                Ok(MoveResult::HitObstacle) => {
                    self.report_death();
                    return Ok(RunOutcome::Died);
                }
                Ok(MoveResult::AteTurbo) => {
                    debug!(ticks = self.config.turbo_ticks, "Turbo picked up");
                    turbo_ticks = self.config.turbo_ticks;
                }
                Ok(_) => {}
                Err(err) => {
                    error!(%err, "Board could not resolve move");
                    self.report_death();
                    return Ok(RunOutcome::Failed);
                }
            }

            let sleep = if turbo_ticks > 0 {
                self.config.turbo_sleep()
            } else {
                self.config.base_sleep()
            };
            turbo_ticks = turbo_ticks.saturating_sub(1);
            self.cancel.sleep(sleep)?;
        }

        Ok(RunOutcome::Died)
    }

    fn maybe_turn(&self, boosted: bool, rng: &mut SmallRng) {
        if rng.gen_bool(self.config.turn_probability(boosted)) {
            self.snake.turn(Direction::random(rng));
        }
    }

    /// Mark the snake dead and notify the listener.
    ///
    /// Safe to call from any thread; only the first call has an effect.
    /// Returns whether this call performed the transition.
    pub fn report_death(&self) -> bool {
        if self
            .alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        info!(snake = %self.snake.id(), length = self.snake.len(), "Snake died");
        if let Some(listener) = &self.listener {
            listener.on_death(self.snake.id());
        }
        true
    }
}
