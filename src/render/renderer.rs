use std::collections::HashMap;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

use crate::game::Position;
use crate::metrics::RaceMetrics;
use crate::race::{Race, RaceStats};

const SNAKE_COLORS: [Color; 4] = [Color::Green, Color::Cyan, Color::Magenta, Color::Blue];

/// What occupies a grid cell, in drawing priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Head { snake: usize, alive: bool },
    Body { snake: usize, alive: bool },
    Obstacle,
    Mouse,
    Turbo,
    Teleport,
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    /// Draw the race. `paused_stats` is set once a pause has fully taken hold.
    pub fn render(
        &self,
        frame: &mut Frame,
        race: &Race,
        metrics: &RaceMetrics,
        paused_stats: Option<&RaceStats>,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Game area
                Constraint::Length(3), // Footer
            ])
            .split(frame.area());

        frame.render_widget(self.render_stats(race, metrics, paused_stats), chunks[0]);
        frame.render_widget(self.render_grid(race), chunks[1]);
        frame.render_widget(self.render_controls(), chunks[2]);
    }

    fn render_grid(&self, race: &Race) -> Paragraph<'static> {
        let cells = Self::occupancy(race);
        let board = race.board();
        let mut lines = Vec::with_capacity(board.height());

        for y in 0..board.height() {
            let spans: Vec<Span> = (0..board.width())
                .map(|x| Self::cell_span(cells.get(&Position::new(x as i32, y as i32)).copied()))
                .collect();
            lines.push(Line::from(spans));
        }

        let title = if race.is_paused() { " Snake Race (paused) " } else { " Snake Race " };
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(Color::White))
                    .title(title),
            )
            .alignment(Alignment::Center)
    }

    /// Snapshot every snake and item into one cell map
    fn occupancy(race: &Race) -> HashMap<Position, Cell> {
        let board = race.board();
        let mut cells = HashMap::new();

        for from in board.teleports().into_keys() {
            cells.insert(from, Cell::Teleport);
        }
        for pos in board.turbo() {
            cells.insert(pos, Cell::Turbo);
        }
        for pos in board.mice() {
            cells.insert(pos, Cell::Mouse);
        }
        for pos in board.obstacles() {
            cells.insert(pos, Cell::Obstacle);
        }

        // later snakes are drawn under earlier ones
        for (index, (snake, status)) in race.snakes().iter().zip(race.statuses()).enumerate().rev() {
            let alive = status.is_alive();
            let body = snake.snapshot();
            for pos in body.iter().skip(1).rev() {
                cells.insert(*pos, Cell::Body { snake: index, alive });
            }
            if let Some(head) = body.first() {
                cells.insert(*head, Cell::Head { snake: index, alive });
            }
        }
        cells
    }

    fn cell_span(cell: Option<Cell>) -> Span<'static> {
        match cell {
            Some(Cell::Head { snake, alive }) => Span::styled(
                "■ ",
                Self::snake_style(snake, alive).add_modifier(Modifier::BOLD),
            ),
            Some(Cell::Body { snake, alive }) => Span::styled("□ ", Self::snake_style(snake, alive)),
            Some(Cell::Obstacle) => Span::styled(
                "# ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Some(Cell::Mouse) => Span::styled("o ", Style::default().fg(Color::White)),
            Some(Cell::Turbo) => Span::styled("» ", Style::default().fg(Color::Yellow)),
            Some(Cell::Teleport) => Span::styled("@ ", Style::default().fg(Color::LightRed)),
            None => Span::styled(". ", Style::default().fg(Color::DarkGray)),
        }
    }

    fn snake_style(snake: usize, alive: bool) -> Style {
        if alive {
            Style::default().fg(SNAKE_COLORS[snake % SNAKE_COLORS.len()])
        } else {
            Style::default().fg(Color::DarkGray)
        }
    }

    fn render_stats(
        &self,
        race: &Race,
        metrics: &RaceMetrics,
        paused_stats: Option<&RaceStats>,
    ) -> Paragraph<'static> {
        let status = match paused_stats {
            Some(stats) => Span::styled(
                describe_stats(stats),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            None if race.is_paused() => {
                Span::styled("Pausing...", Style::default().fg(Color::Yellow))
            }
            None => Span::styled("Running", Style::default().fg(Color::Green)),
        };

        let text = vec![Line::from(vec![
            status,
            Span::raw("    "),
            Span::styled("Alive: ", Style::default().fg(Color::Yellow)),
            Span::styled(
                format!("{}/{}", race.alive_count(), race.snakes().len()),
                Style::default().fg(Color::White),
            ),
            Span::raw("    "),
            Span::styled("Time: ", Style::default().fg(Color::Yellow)),
            Span::styled(metrics.format_time(), Style::default().fg(Color::White)),
        ])];

        Paragraph::new(text).alignment(Alignment::Center)
    }

    fn render_controls(&self) -> Paragraph<'static> {
        let text = vec![Line::from(vec![
            Span::styled("↑↓←→", Style::default().fg(Color::Cyan)),
            Span::raw(" snake #0 | "),
            Span::styled("WASD", Style::default().fg(Color::Cyan)),
            Span::raw(" snake #1 | "),
            Span::styled("Space", Style::default().fg(Color::Yellow)),
            Span::raw(" pause/resume | "),
            Span::styled("Q", Style::default().fg(Color::Red)),
            Span::raw(" to quit"),
        ])];

        Paragraph::new(text).alignment(Alignment::Center)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// One-line summary of a paused race
pub fn describe_stats(stats: &RaceStats) -> String {
    let longest = match stats.longest_alive {
        Some((id, length)) => format!("Longest alive: {} ({})", id, length),
        None => "Longest alive: N/A".to_string(),
    };
    let first_dead = match stats.first_dead {
        Some(id) => format!("First dead: {}", id),
        None => "First dead: N/A".to_string(),
    };
    format!("{} | {}", longest, first_dead)
}
