//! Snakes and the board they race on
//!
//! This module holds the state that runner threads mutate and renderers
//! read, plus the board that resolves every move. It has no I/O or
//! rendering dependencies.

pub mod action;
pub mod board;
pub mod config;
pub mod state;

// Re-export commonly used types
pub use action::Direction;
pub use board::{Board, BoardError, GridBoard, MoveResult};
pub use config::{RaceConfig, RunnerConfig};
pub use state::{Position, Snake, SnakeId};
