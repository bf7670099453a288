//! Group pause for every snake runner.
//!
//! The controller tracks how many runners are registered. `pause_all` arms a
//! fresh [`QuiescenceGate`] sized to that number; each runner acknowledges at
//! its next pause check and then blocks until `resume_all`. A runner that
//! leaves while a pause is armed, for whatever reason, counts toward the gate
//! in place of the acknowledgement it will never make, so
//! `await_pause_completion` can always return.
//!
//! Resuming drops the cycle's broadcast sender, waking every blocked runner
//! at once. A runner that wakes into a newer pause acknowledges that one too
//! before it is allowed to move.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::cancel::{CancelToken, Cancelled};
use super::gate::QuiescenceGate;

#[derive(Debug)]
struct PauseState {
    active: usize,
    paused: bool,
    epoch: u64,
    gate: Arc<QuiescenceGate>,
    // held only while paused; dropping it wakes every receiver of `resumed`
    resume: Option<Sender<()>>,
    resumed: Receiver<()>,
}

/// Pause barrier shared by all runners of one race
#[derive(Debug)]
pub struct PauseController {
    state: Mutex<PauseState>,
}

impl PauseController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PauseState {
                active: 0,
                paused: false,
                epoch: 0,
                gate: Arc::new(QuiescenceGate::new(0)),
                resume: None,
                resumed: crossbeam_channel::never(),
            }),
        }
    }

    /// Register a starting runner. The runner stays registered until the
    /// returned guard is dropped or [`RunnerRegistration::deregister`]ed.
    ///
    /// A runner that joins during a pause is not part of that pause's gate.
    pub fn register_runner(self: &Arc<Self>) -> RunnerRegistration {
        let mut state = self.state.lock();
        state.active += 1;
        let acknowledged = if state.paused { state.epoch } else { 0 };
        debug!(active = state.active, "Runner registered");

        RunnerRegistration {
            controller: Arc::clone(self),
            acknowledged: Cell::new(acknowledged),
        }
    }

    fn deregister(&self, acknowledged: u64) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        if state.paused && acknowledged != state.epoch {
            state.gate.count_down();
        }
        debug!(
            active = state.active,
            paused = state.paused,
            remaining = state.gate.remaining(),
            "Runner deregistered"
        );
    }

    /// Request a pause of every registered runner. Does not block; a no-op
    /// while already paused.
    pub fn pause_all(&self) {
        let mut state = self.state.lock();
        if state.paused {
            return;
        }

        let (resume, resumed) = crossbeam_channel::bounded(0);
        state.paused = true;
        state.epoch += 1;
        state.gate = Arc::new(QuiescenceGate::new(state.active));
        state.resume = Some(resume);
        state.resumed = resumed;
        info!(epoch = state.epoch, runners = state.active, "Pause requested");
    }

    /// Release every runner blocked in [`await_if_paused`](Self::await_if_paused).
    /// A no-op while not paused.
    pub fn resume_all(&self) {
        let mut state = self.state.lock();
        if !state.paused {
            return;
        }

        state.paused = false;
        state.resume.take();
        info!(epoch = state.epoch, "Resumed");
    }

    /// Block until every runner that was registered at the last `pause_all`
    /// has acknowledged it or left. Returns at once when not paused.
    pub fn await_pause_completion(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        let Some(gate) = self.current_gate() else {
            return Ok(());
        };
        gate.wait(cancel)
    }

    /// Like [`await_pause_completion`](Self::await_pause_completion) with a
    /// deadline instead of a token. Returns whether the pause completed.
    pub fn await_pause_completion_timeout(&self, timeout: Duration) -> bool {
        match self.current_gate() {
            Some(gate) => gate.wait_timeout(timeout),
            None => true,
        }
    }

    fn current_gate(&self) -> Option<Arc<QuiescenceGate>> {
        let state = self.state.lock();
        state.paused.then(|| Arc::clone(&state.gate))
    }

    /// Pause check for runners.
    ///
    /// While paused, acknowledges the current pause once and blocks until
    /// resumed or cancelled. Returns immediately when not paused.
    pub fn await_if_paused(
        &self,
        registration: &RunnerRegistration,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled> {
        debug_assert!(
            std::ptr::eq(Arc::as_ptr(&registration.controller), self),
            "registration belongs to another controller"
        );

        loop {
            let resumed = {
                let state = self.state.lock();
                if !state.paused {
                    return Ok(());
                }
                if registration.acknowledged.get() != state.epoch {
                    registration.acknowledged.set(state.epoch);
                    state.gate.count_down();
                    debug!(
                        epoch = state.epoch,
                        remaining = state.gate.remaining(),
                        "Runner acknowledged pause"
                    );
                }
                state.resumed.clone()
            };

            select! {
                recv(resumed) -> _ => {
                    cancel.check()?;
                },
                recv(cancel.receiver()) -> _ => return Err(Cancelled),
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Number of registered runners
    pub fn active_runners(&self) -> usize {
        self.state.lock().active
    }

    /// Number of pauses requested so far
    pub fn pause_epoch(&self) -> u64 {
        self.state.lock().epoch
    }
}

impl Default for PauseController {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that a runner is registered with a [`PauseController`].
///
/// Dropping it deregisters the runner, so a runner leaves the pause
/// accounting on every exit path, unwinding included.
#[derive(Debug)]
pub struct RunnerRegistration {
    controller: Arc<PauseController>,
    // last pause epoch this runner acknowledged or was exempt from; 0 for none
    acknowledged: Cell<u64>,
}

impl RunnerRegistration {
    pub fn deregister(self) {
        drop(self);
    }
}

impl Drop for RunnerRegistration {
    fn drop(&mut self) {
        self.controller.deregister(self.acknowledged.get());
    }
}
