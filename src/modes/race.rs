use std::io::{stderr, Stderr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::interval;
use tracing::{debug, info};

use crate::concurrency::{Cancelled, Canceller};
use crate::game::RaceConfig;
use crate::input::{InputHandler, KeyAction};
use crate::metrics::RaceMetrics;
use crate::race::{Race, RaceStats};
use crate::render::Renderer;

/// Interactive race in the terminal
pub struct RaceMode {
    race: Race,
    metrics: RaceMetrics,
    renderer: Renderer,
    input_handler: InputHandler,
    should_quit: bool,
    // filled once a pause has fully taken hold
    paused_stats: Option<RaceStats>,
    // cancels the quiescence wait of a pause that has not taken hold yet
    pending_pause: Option<Canceller>,
}

/// Pause epoch and how its quiescence wait ended
type PauseResult = (u64, Result<(), Cancelled>);

impl RaceMode {
    pub fn new(config: RaceConfig) -> Result<Self> {
        Ok(Self {
            race: Race::new(config)?,
            metrics: RaceMetrics::new(),
            renderer: Renderer::new(),
            input_handler: InputHandler::new(),
            should_quit: false,
            paused_stats: None,
            pending_pause: None,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stderr = stderr();
        execute!(stderr, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stderr);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor().context("Failed to hide cursor")?;
        terminal.clear().context("Failed to clear terminal")?;

        // Run race loop with cleanup
        let result = match self.race.start() {
            Ok(()) => self.run_race_loop(&mut terminal).await,
            Err(err) => Err(err),
        };

        // Stop the snakes before giving the terminal back
        self.cancel_pending_pause();
        self.race.shutdown();
        self.cleanup_terminal(&mut terminal)?;

        result
    }

    async fn run_race_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        let mut event_stream = EventStream::new();
        let (pause_done, mut pause_results) = mpsc::unbounded_channel::<PauseResult>();

        // Render at 30 FPS (33ms per frame); snakes move on their own threads
        let render_interval = Duration::from_millis(33);
        let mut render_timer = interval(render_interval);

        loop {
            tokio::select! {
                // Handle terminal events
                maybe_event = event_stream.next() => {
                    if let Some(Ok(event)) = maybe_event {
                        self.handle_event(event, &pause_done);
                    }
                }

                // A pause has taken hold (or its wait was cancelled)
                Some((epoch, result)) = pause_results.recv() => {
                    self.finish_pause(epoch, result);
                }

                // Render frame
                _ = render_timer.tick() => {
                    self.collect_deaths();
                    self.metrics.update();
                    terminal.draw(|frame| {
                        self.renderer.render(
                            frame,
                            &self.race,
                            &self.metrics,
                            self.paused_stats.as_ref(),
                        );
                    }).context("Failed to draw frame")?;
                }

                // Handle Ctrl+C
                _ = tokio::signal::ctrl_c() => {
                    self.should_quit = true;
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event, pause_done: &UnboundedSender<PauseResult>) {
        if let Event::Key(key) = event {
            // Only process key press events, not release
            if key.kind != KeyEventKind::Press {
                return;
            }

            match self.input_handler.handle_key_event(key) {
                KeyAction::Steer { snake, direction } => {
                    self.race.steer(snake, direction);
                }
                KeyAction::TogglePause => self.toggle_pause(pause_done),
                KeyAction::Quit => self.should_quit = true,
                KeyAction::None => {}
            }
        }
    }

    /// Resume if paused. Otherwise request a pause and wait for quiescence on
    /// a blocking thread, reporting to `pause_done` so the event loop keeps
    /// reading keys meanwhile.
    fn toggle_pause(&mut self, pause_done: &UnboundedSender<PauseResult>) {
        if self.race.is_paused() {
            self.cancel_pending_pause();
            self.paused_stats = None;
            self.race.resume();
            self.metrics.on_resume();
            return;
        }

        self.metrics.on_pause();
        let pause = Arc::clone(self.race.pause_controller());
        pause.pause_all();
        let epoch = pause.pause_epoch();

        let canceller = Canceller::new();
        let token = canceller.token();
        self.pending_pause = Some(canceller);

        let pause_done = pause_done.clone();
        tokio::task::spawn_blocking(move || {
            let result = pause.await_pause_completion(&token);
            // the loop is gone when quitting
            let _ = pause_done.send((epoch, result));
        });
    }

    /// Show the paused standings if `epoch` is still the pause in force
    fn finish_pause(&mut self, epoch: u64, result: Result<(), Cancelled>) {
        let pause = self.race.pause_controller();
        if result.is_err() || !pause.is_paused() || pause.pause_epoch() != epoch {
            debug!(epoch, "Stale pause wait ignored");
            return;
        }

        self.pending_pause = None;
        let stats = self.race.stats();
        info!(?stats, "Race paused");
        self.paused_stats = Some(stats);
    }

    fn cancel_pending_pause(&mut self) {
        if let Some(canceller) = self.pending_pause.take() {
            canceller.cancel();
        }
    }

    fn collect_deaths(&mut self) {
        let deaths = self.race.deaths().try_iter().count();
        for _ in 0..deaths {
            self.metrics.on_death();
        }
        if deaths > 0 && self.paused_stats.is_some() {
            self.paused_stats = Some(self.race.stats());
        }
    }

    fn cleanup_terminal(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        disable_raw_mode().context("Failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("Failed to leave alternate screen")?;
        terminal.show_cursor().context("Failed to show cursor")?;
        Ok(())
    }
}
