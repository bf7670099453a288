//! The shared grid every snake moves on.
//!
//! Runners never decide what a move means; they hand their snake to a
//! [`Board`] and act on the [`MoveResult`] it returns. [`GridBoard`] is the
//! wrapping grid used by the race, serializing every step behind one lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use super::config::MAX_GRID_SIDE;
use super::state::{Position, Snake, SnakeId};

/// Chance that eating a mouse also drops a new turbo item
const TURBO_SPAWN_CHANCE: f64 = 0.2;

/// Outcome of one step of one snake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// Plain move
    Continue,
    /// Moved onto an obstacle; fatal
    HitObstacle,
    /// Picked up a turbo item
    AteTurbo,
    /// Ate a mouse and grew
    AteMouse,
    /// Entered a teleport and came out at its exit
    Teleported,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("snake {0} is not on this board")]
    UnknownSnake(SnakeId),
}

/// Resolves moves for all snakes.
///
/// Implementations are shared by every runner thread, so `step` must be safe
/// to call concurrently, must return exactly one outcome per call and must
/// not block indefinitely.
pub trait Board: Send + Sync {
    fn step(&self, snake: &Snake) -> Result<MoveResult, BoardError>;
}

#[derive(Debug)]
struct Cells {
    obstacles: HashSet<Position>,
    mice: HashSet<Position>,
    turbo: HashSet<Position>,
    teleports: HashMap<Position, Position>,
    snakes: HashMap<SnakeId, Arc<Snake>>,
    rng: SmallRng,
}

impl Cells {
    fn is_free(&self, pos: Position) -> bool {
        !self.obstacles.contains(&pos)
            && !self.mice.contains(&pos)
            && !self.turbo.contains(&pos)
            && !self.teleports.contains_key(&pos)
            && !self.teleports.values().any(|exit| *exit == pos)
            && !self.snakes.values().any(|snake| snake.occupies(pos))
    }

    fn random_free_cell(&mut self, width: usize, height: usize) -> Option<Position> {
        for _ in 0..width.saturating_mul(height).saturating_mul(4) {
            let pos = Position::new(
                self.rng.gen_range(0..width) as i32,
                self.rng.gen_range(0..height) as i32,
            );
            if self.is_free(pos) {
                return Some(pos);
            }
        }

        // nearly full grid, fall back to a scan
        (0..height as i32)
            .flat_map(|y| (0..width as i32).map(move |x| Position::new(x, y)))
            .find(|pos| self.is_free(*pos))
    }
}

/// Finite grid whose edges wrap around.
#[derive(Debug)]
pub struct GridBoard {
    width: usize,
    height: usize,
    cells: Mutex<Cells>,
}

impl GridBoard {
    /// Create an empty board; panics on a zero-sized grid or a side
    /// longer than [`MAX_GRID_SIDE`]
    pub fn new(width: usize, height: usize, seed: Option<u64>) -> Self {
        assert!(width > 0 && height > 0, "board must be at least 1x1");
        assert!(
            width <= MAX_GRID_SIDE && height <= MAX_GRID_SIDE,
            "board sides must fit in i32"
        );
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Self {
            width,
            height,
            cells: Mutex::new(Cells {
                obstacles: HashSet::new(),
                mice: HashSet::new(),
                turbo: HashSet::new(),
                teleports: HashMap::new(),
                snakes: HashMap::new(),
                rng,
            }),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Make a snake known to the board so it may step and so items avoid it
    pub fn add_snake(&self, snake: Arc<Snake>) {
        self.cells.lock().snakes.insert(snake.id(), snake);
    }

    /// Scatter items on free cells. Items that no longer fit are skipped.
    pub fn populate(&self, obstacles: usize, mice: usize, turbo: usize, teleport_pairs: usize) {
        let mut cells = self.cells.lock();

        for _ in 0..obstacles {
            if let Some(pos) = cells.random_free_cell(self.width, self.height) {
                cells.obstacles.insert(pos);
            }
        }
        for _ in 0..mice {
            if let Some(pos) = cells.random_free_cell(self.width, self.height) {
                cells.mice.insert(pos);
            }
        }
        for _ in 0..turbo {
            if let Some(pos) = cells.random_free_cell(self.width, self.height) {
                cells.turbo.insert(pos);
            }
        }
        for _ in 0..teleport_pairs {
            let Some(a) = cells.random_free_cell(self.width, self.height) else {
                break;
            };
            cells.teleports.insert(a, a);
            let Some(b) = cells.random_free_cell(self.width, self.height) else {
                cells.teleports.remove(&a);
                break;
            };
            cells.teleports.insert(a, b);
            cells.teleports.insert(b, a);
        }

        debug!(
            obstacles = cells.obstacles.len(),
            mice = cells.mice.len(),
            turbo = cells.turbo.len(),
            teleports = cells.teleports.len(),
            "Board populated"
        );
    }

    pub fn place_obstacle(&self, pos: Position) {
        self.cells.lock().obstacles.insert(self.wrap(pos));
    }

    pub fn place_mouse(&self, pos: Position) {
        self.cells.lock().mice.insert(self.wrap(pos));
    }

    pub fn place_turbo(&self, pos: Position) {
        self.cells.lock().turbo.insert(self.wrap(pos));
    }

    /// One-way teleport from `from` to `to`
    pub fn place_teleport(&self, from: Position, to: Position) {
        let (from, to) = (self.wrap(from), self.wrap(to));
        self.cells.lock().teleports.insert(from, to);
    }

    pub fn obstacles(&self) -> Vec<Position> {
        self.cells.lock().obstacles.iter().copied().collect()
    }

    pub fn mice(&self) -> Vec<Position> {
        self.cells.lock().mice.iter().copied().collect()
    }

    pub fn turbo(&self) -> Vec<Position> {
        self.cells.lock().turbo.iter().copied().collect()
    }

    pub fn teleports(&self) -> HashMap<Position, Position> {
        self.cells.lock().teleports.clone()
    }

    fn wrap(&self, pos: Position) -> Position {
        Position::new(
            pos.x.rem_euclid(self.width as i32),
            pos.y.rem_euclid(self.height as i32),
        )
    }
}

impl Board for GridBoard {
    fn step(&self, snake: &Snake) -> Result<MoveResult, BoardError> {
        let mut cells = self.cells.lock();
        if !cells.snakes.contains_key(&snake.id()) {
            return Err(BoardError::UnknownSnake(snake.id()));
        }

        let mut next = self.wrap(snake.head().moved_in_direction(snake.direction()));
        if cells.obstacles.contains(&next) {
            return Ok(MoveResult::HitObstacle);
        }

        let teleported = match cells.teleports.get(&next) {
            Some(exit) => {
                next = *exit;
                true
            }
            None => false,
        };

        let ate_mouse = cells.mice.remove(&next);
        let ate_turbo = cells.turbo.remove(&next);
        snake.advance(next, ate_mouse);

        if ate_mouse {
            if let Some(pos) = cells.random_free_cell(self.width, self.height) {
                cells.mice.insert(pos);
            }
            if let Some(pos) = cells.random_free_cell(self.width, self.height) {
                cells.obstacles.insert(pos);
            }
            if cells.rng.gen_bool(TURBO_SPAWN_CHANCE) {
                if let Some(pos) = cells.random_free_cell(self.width, self.height) {
                    cells.turbo.insert(pos);
                }
            }
        }

        Ok(if ate_turbo {
            MoveResult::AteTurbo
        } else if ate_mouse {
            MoveResult::AteMouse
        } else if teleported {
            MoveResult::Teleported
        } else {
            MoveResult::Continue
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Direction;

    fn board_with_snake(x: i32, y: i32, direction: Direction) -> (GridBoard, Arc<Snake>) {
        let board = GridBoard::new(10, 10, Some(1));
        let snake = Arc::new(Snake::new(SnakeId(0), Position::new(x, y), direction));
        board.add_snake(Arc::clone(&snake));
        (board, snake)
    }

    #[test]
    #[should_panic(expected = "board sides must fit in i32")]
    fn test_side_beyond_i32_is_refused() {
        GridBoard::new(MAX_GRID_SIDE + 1, 3, Some(1));
    }

    #[test]
    fn test_basic_movement() {
        let (board, snake) = board_with_snake(5, 5, Direction::Right);
        assert_eq!(board.step(&snake), Ok(MoveResult::Continue));
        assert_eq!(snake.head(), Position::new(6, 5));
        assert_eq!(snake.len(), 2);
    }

    #[test]
    fn test_edges_wrap() {
        let (board, snake) = board_with_snake(0, 0, Direction::Left);
        board.step(&snake).unwrap();
        assert_eq!(snake.head(), Position::new(9, 0));

        snake.turn(Direction::Up);
        board.step(&snake).unwrap();
        assert_eq!(snake.head(), Position::new(9, 9));
    }

    #[test]
    fn test_obstacle_is_fatal_and_does_not_move() {
        let (board, snake) = board_with_snake(5, 5, Direction::Right);
        board.place_obstacle(Position::new(6, 5));
        assert_eq!(board.step(&snake), Ok(MoveResult::HitObstacle));
        assert_eq!(snake.head(), Position::new(5, 5));
    }

    #[test]
    fn test_mouse_grows_and_respawns() {
        let (board, snake) = board_with_snake(5, 5, Direction::Right);
        board.place_mouse(Position::new(6, 5));
        let capacity = snake.capacity();

        assert_eq!(board.step(&snake), Ok(MoveResult::AteMouse));
        assert_eq!(snake.capacity(), capacity + 1);
        let mice = board.mice();
        assert_eq!(mice.len(), 1);
        assert_ne!(mice[0], Position::new(6, 5));
        assert_eq!(board.obstacles().len(), 1);
    }

    #[test]
    fn test_turbo_is_consumed() {
        let (board, snake) = board_with_snake(5, 5, Direction::Down);
        board.place_turbo(Position::new(5, 6));
        assert_eq!(board.step(&snake), Ok(MoveResult::AteTurbo));
        assert!(board.turbo().is_empty());
    }

    #[test]
    fn test_teleport_moves_head_to_exit() {
        let (board, snake) = board_with_snake(1, 1, Direction::Right);
        board.place_teleport(Position::new(2, 1), Position::new(7, 7));
        assert_eq!(board.step(&snake), Ok(MoveResult::Teleported));
        assert_eq!(snake.head(), Position::new(7, 7));
    }

    #[test]
    fn test_unknown_snake_is_an_error() {
        let board = GridBoard::new(5, 5, Some(3));
        let stranger = Snake::new(SnakeId(9), Position::new(0, 0), Direction::Up);
        assert_eq!(
            board.step(&stranger),
            Err(BoardError::UnknownSnake(SnakeId(9)))
        );
    }

    #[test]
    fn test_populate_uses_free_cells() {
        let (board, snake) = board_with_snake(0, 0, Direction::Right);
        board.populate(5, 4, 3, 2);

        let mut taken = HashSet::new();
        for pos in board
            .obstacles()
            .into_iter()
            .chain(board.mice())
            .chain(board.turbo())
        {
            assert!(taken.insert(pos), "{:?} used twice", pos);
        }
        assert_eq!(taken.len(), 12);
        assert_eq!(board.teleports().len(), 4);
        assert!(!taken.contains(&snake.head()));
    }

    #[test]
    fn test_populate_skips_what_does_not_fit() {
        let board = GridBoard::new(2, 2, Some(5));
        board.populate(10, 0, 0, 0);
        assert_eq!(board.obstacles().len(), 4);
    }
}
