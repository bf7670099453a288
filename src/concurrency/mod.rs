//! Thread coordination for the race
//!
//! One [`SnakeRunner`] per snake, each on its own thread, all sharing a
//! single [`PauseController`]. Blocking waits take a [`CancelToken`] so that
//! every runner and every waiter can be stopped promptly.

pub mod cancel;
pub mod gate;
pub mod pause;
pub mod runner;

pub use cancel::{CancelToken, Cancelled, Canceller};
pub use gate::QuiescenceGate;
pub use pause::{PauseController, RunnerRegistration};
pub use runner::{LifecycleListener, RunOutcome, SnakeRunner};
