use std::time::{Duration, Instant};

/// Clock and counters for the status bar. Paused time is not counted.
pub struct RaceMetrics {
    pub started_at: Instant,
    pub elapsed_time: Duration,
    pub pauses: u32,
    pub deaths_seen: u32,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl RaceMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            elapsed_time: Duration::ZERO,
            pauses: 0,
            deaths_seen: 0,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    pub fn update(&mut self) {
        let paused_now = self.paused_at.map_or(Duration::ZERO, |at| at.elapsed());
        self.elapsed_time = self
            .started_at
            .elapsed()
            .saturating_sub(self.paused_total + paused_now);
    }

    pub fn on_pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
            self.pauses += 1;
        }
    }

    pub fn on_resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += at.elapsed();
        }
    }

    pub fn on_death(&mut self) {
        self.deaths_seen += 1;
    }

    pub fn format_time(&self) -> String {
        let total_secs = self.elapsed_time.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }
}

impl Default for RaceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
