//! Cooperative cancellation for blocking waits.
//!
//! A [`Canceller`] owns the only sender of a channel nobody ever sends on.
//! Cancelling drops that sender, which disconnects every [`CancelToken`]
//! receiver at once, so any `select!` or timed receive on a token wakes
//! immediately instead of polling a flag.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use thiserror::Error;

/// A blocking wait was abandoned because its token was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Side that triggers cancellation. Dropping it cancels as well.
#[derive(Debug)]
pub struct Canceller {
    sender: Mutex<Option<Sender<()>>>,
    token: CancelToken,
}

impl Canceller {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            token: CancelToken { receiver },
        }
    }

    /// A token observing this canceller
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Cancel every token; idempotent
    pub fn cancel(&self) {
        self.sender.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

/// Side that observes cancellation
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: Receiver<()>,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self {
            receiver: crossbeam_channel::never(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration` unless cancelled first
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        match self.receiver.recv_timeout(duration) {
            Err(RecvTimeoutError::Disconnected) => Err(Cancelled),
            Err(RecvTimeoutError::Timeout) | Ok(()) => Ok(()),
        }
    }

    /// Receiver that disconnects on cancellation, for use in `select!`
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}
