//! Reply slots for blocking cross-thread invocations.
//!
//! A transport thread that posts a request onto the UI loop and needs the
//! answer creates a [`reply_pair`], ships the [`ReplySender`] along with the
//! request, and blocks on the [`ReplyReceiver`]. The UI thread delivers exactly
//! one value; dropping the sender without delivering wakes the waiter with
//! [`LoopError::ReplyDropped`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::LoopError;

enum SlotState<T> {
    Pending,
    Ready(T),
    Dropped,
    Taken,
}

struct ReplyState<T> {
    slot: Mutex<SlotState<T>>,
    condvar: Condvar,
}

/// The delivering half of a reply slot.
pub struct ReplySender<T> {
    inner: Option<Arc<ReplyState<T>>>,
}

impl<T> ReplySender<T> {
    /// Deliver the reply, waking the waiter.
    pub fn send(mut self, value: T) {
        if let Some(inner) = self.inner.take() {
            *inner.slot.lock() = SlotState::Ready(value);
            inner.condvar.notify_all();
        }
    }
}

impl<T> Drop for ReplySender<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            let mut slot = inner.slot.lock();
            if matches!(*slot, SlotState::Pending) {
                crate::dashstack_warn!("reply sender dropped without a reply");
                *slot = SlotState::Dropped;
            }
            inner.condvar.notify_all();
        }
    }
}

impl<T> std::fmt::Debug for ReplySender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySender")
            .field("pending", &self.inner.is_some())
            .finish()
    }
}

/// The waiting half of a reply slot.
pub struct ReplyReceiver<T> {
    inner: Arc<ReplyState<T>>,
}

impl<T> ReplyReceiver<T> {
    /// Block until the reply arrives.
    ///
    /// # Warning
    ///
    /// Calling this on the UI thread while the reply is supposed to be produced
    /// by that same thread deadlocks.
    pub fn wait(self) -> Result<T, LoopError> {
        let mut slot = self.inner.slot.lock();
        loop {
            match std::mem::replace(&mut *slot, SlotState::Taken) {
                SlotState::Ready(value) => return Ok(value),
                SlotState::Dropped => return Err(LoopError::ReplyDropped),
                SlotState::Pending => {
                    *slot = SlotState::Pending;
                    self.inner.condvar.wait(&mut slot);
                }
                SlotState::Taken => return Err(LoopError::ReplyDropped),
            }
        }
    }

    /// Wait for the reply with a timeout.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, LoopError> {
        let deadline = std::time::Instant::now() + timeout;
        let mut slot = self.inner.slot.lock();
        while matches!(*slot, SlotState::Pending) {
            if self.inner.condvar.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        match std::mem::replace(&mut *slot, SlotState::Taken) {
            SlotState::Ready(value) => Ok(value),
            SlotState::Pending => Err(LoopError::ReplyTimeout),
            SlotState::Dropped | SlotState::Taken => Err(LoopError::ReplyDropped),
        }
    }

    /// Take the reply if it has already been delivered.
    pub fn try_take(&self) -> Option<T> {
        let mut slot = self.inner.slot.lock();
        match std::mem::replace(&mut *slot, SlotState::Taken) {
            SlotState::Ready(value) => Some(value),
            other => {
                *slot = other;
                None
            }
        }
    }
}

/// Create a sender/receiver pair for a single reply.
pub fn reply_pair<T>() -> (ReplySender<T>, ReplyReceiver<T>) {
    let state = Arc::new(ReplyState {
        slot: Mutex::new(SlotState::Pending),
        condvar: Condvar::new(),
    });

    (
        ReplySender {
            inner: Some(state.clone()),
        },
        ReplyReceiver { inner: state },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_across_threads() {
        let (sender, receiver) = reply_pair();

        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            sender.send(42);
        });

        assert_eq!(receiver.wait(), Ok(42));
        thread.join().unwrap();
    }

    #[test]
    fn test_dropped_sender_wakes_waiter() {
        let (sender, receiver) = reply_pair::<u8>();
        let thread = std::thread::spawn(move || drop(sender));

        assert_eq!(receiver.wait(), Err(LoopError::ReplyDropped));
        thread.join().unwrap();
    }

    #[test]
    fn test_timeout() {
        let (_sender, receiver) = reply_pair::<u8>();
        assert_eq!(
            receiver.wait_timeout(Duration::from_millis(10)),
            Err(LoopError::ReplyTimeout)
        );
    }

    #[test]
    fn test_try_take() {
        let (sender, receiver) = reply_pair();
        assert_eq!(receiver.try_take(), None);
        sender.send("done");
        assert_eq!(receiver.try_take(), Some("done"));
    }
}
