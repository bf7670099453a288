//! Snake Race - several snakes on one grid, each moved by its own thread
//!
//! This library provides:
//! - Thread-safe snake state and the board that resolves moves (game module)
//! - The group pause barrier and the per-snake runner loop (concurrency module)
//! - The race supervisor that owns threads, pause and death ledger (race module)
//! - TUI rendering, input handling and metrics
//! - Interactive and headless execution modes

pub mod concurrency;
pub mod game;
pub mod input;
pub mod metrics;
pub mod modes;
pub mod race;
pub mod render;
