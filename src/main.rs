use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use snake_race::game::RaceConfig;
use snake_race::modes::{HeadlessMode, RaceMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snake_race")]
#[command(version, about = "Snakes racing on one grid, one thread each")]
struct Cli {
    /// How to run the race
    #[arg(long, default_value = "tui")]
    mode: Mode,

    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of snakes
    #[arg(long)]
    snakes: Option<usize>,

    /// Grid width
    #[arg(long)]
    width: Option<usize>,

    /// Grid height
    #[arg(long)]
    height: Option<usize>,

    /// Seed for the board layout and steering
    #[arg(long)]
    seed: Option<u64>,

    /// Headless race length in seconds
    #[arg(long, default_value = "10")]
    duration: u64,

    /// Headless checkpoint interval in milliseconds
    #[arg(long, default_value = "1000")]
    checkpoint_ms: u64,

    /// Log file used while the terminal UI owns the screen
    #[arg(long, default_value = "snake_race.log")]
    log_file: PathBuf,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    /// Watch and steer the race in the terminal
    Tui,
    /// Run without UI, logging standings at checkpoints
    Headless,
}

impl Cli {
    fn race_config(&self) -> Result<RaceConfig> {
        let mut config = match &self.config {
            Some(path) => RaceConfig::load(path)?,
            None => RaceConfig::default(),
        };

        if let Some(snakes) = self.snakes {
            config.snakes = snakes;
        }
        if let Some(width) = self.width {
            config.grid_width = width;
        }
        if let Some(height) = self.height {
            config.grid_height = height;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(mode: &Mode, log_file: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match mode {
        // the alternate screen owns stderr, so logs go to a file
        Mode::Tui => {
            let file = std::fs::File::create(log_file)
                .with_context(|| format!("Failed to create log file {:?}", log_file))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
                .map_err(anyhow::Error::msg)
                .context("Failed to install log subscriber")?;
        }
        Mode::Headless => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_thread_names(true)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(anyhow::Error::msg)
                .context("Failed to install log subscriber")?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.mode, &cli.log_file)?;

    // Build race configuration from file and CLI arguments
    let config = cli.race_config()?;

    // Dispatch to appropriate mode
    match cli.mode {
        Mode::Tui => {
            let mut race_mode = RaceMode::new(config)?;
            race_mode.run().await?;
        }
        Mode::Headless => {
            let duration = Duration::from_secs(cli.duration);
            let checkpoint = Duration::from_millis(cli.checkpoint_ms);
            tokio::task::spawn_blocking(move || {
                HeadlessMode::new(config, duration, checkpoint)?.run()
            })
            .await
            .context("Headless race panicked")??;
        }
    }

    Ok(())
}
