use std::time::Duration;

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::cancel::{CancelToken, Cancelled};

#[derive(Debug)]
struct Count {
    remaining: usize,
    // dropped when `remaining` reaches zero, which opens the gate for every waiter
    opener: Option<Sender<()>>,
}

/// Countdown gate created fresh for every pause cycle.
///
/// It opens once it has been counted down `required` times and stays open;
/// extra count-downs are ignored.
#[derive(Debug)]
pub struct QuiescenceGate {
    required: usize,
    count: Mutex<Count>,
    opened: Receiver<()>,
}

impl QuiescenceGate {
    pub fn new(required: usize) -> Self {
        let (opener, opened) = crossbeam_channel::bounded(0);
        let opener = (required > 0).then_some(opener);

        Self {
            required,
            count: Mutex::new(Count {
                remaining: required,
                opener,
            }),
            opened,
        }
    }

    /// Count one participant as done. Returns false if the gate was already open.
    pub fn count_down(&self) -> bool {
        let mut count = self.count.lock();
        if count.remaining == 0 {
            return false;
        }
        count.remaining -= 1;
        if count.remaining == 0 {
            count.opener.take();
        }
        true
    }

    pub fn required(&self) -> usize {
        self.required
    }

    pub fn remaining(&self) -> usize {
        self.count.lock().remaining
    }

    pub fn is_open(&self) -> bool {
        self.remaining() == 0
    }

    /// Block until the gate opens or `cancel` fires.
    ///
    /// An open gate wins over a cancellation that arrives at the same time.
    pub fn wait(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        if self.is_open() {
            return Ok(());
        }
        select! {
            recv(self.opened) -> _ => Ok(()),
            recv(cancel.receiver()) -> _ => {
                if self.is_open() {
                    Ok(())
                } else {
                    Err(Cancelled)
                }
            }
        }
    }

    /// Block for at most `timeout`; returns whether the gate is open
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_open() {
            return true;
        }
        match self.opened.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_open(),
            Err(RecvTimeoutError::Disconnected) | Ok(()) => true,
        }
    }
}
