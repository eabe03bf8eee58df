//! The UI-thread message loop.
//!
//! A [`MessageLoop`] is owned by the single thread that owns all UI state.
//! Other threads talk to it exclusively through cloned [`LoopProxy`] handles,
//! which post typed messages in FIFO order. The owner drains the loop with
//! [`MessageLoop::pump_at`] (non-blocking, explicit clock) or
//! [`MessageLoop::run`] (blocking until quit).
//!
//! # Example
//!
//! ```
//! use dashstack_core::{LoopEvent, MessageLoop};
//! use std::time::{Duration, Instant};
//!
//! let mut ui_loop = MessageLoop::<&'static str>::new();
//! let proxy = ui_loop.proxy();
//!
//! std::thread::spawn(move || proxy.post("image ready").unwrap())
//!     .join()
//!     .unwrap();
//!
//! let now = Instant::now();
//! let timer = ui_loop.start_timer_at(now, Duration::from_millis(5));
//!
//! let events = ui_loop.pump_at(now + Duration::from_millis(5));
//! assert_eq!(events, vec![LoopEvent::Timer { id: timer }, LoopEvent::Message("image ready")]);
//! ```

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};

use crate::error::{LoopError, Result};
use crate::event::{EventPriority, LoopEvent};
use crate::thread_check::ThreadAffinity;
use crate::timer::{TimerId, TimerManager};

/// Upper bound on a single blocking wait when no timer is pending.
const IDLE_WAIT: Duration = Duration::from_millis(500);

enum Envelope<M> {
    Message(M),
    Quit,
}

/// A cloneable, `Send` handle for posting onto a [`MessageLoop`].
pub struct LoopProxy<M> {
    sender: Sender<Envelope<M>>,
}

impl<M> Clone for LoopProxy<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M> std::fmt::Debug for LoopProxy<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopProxy")
            .field("queued", &self.sender.len())
            .finish()
    }
}

impl<M: Send> LoopProxy<M> {
    /// Post a message. Messages are delivered in the order they were posted.
    pub fn post(&self, message: M) -> std::result::Result<(), LoopError> {
        self.sender
            .send(Envelope::Message(message))
            .map_err(|_| LoopError::Disconnected)
    }

    /// Ask the loop to stop.
    pub fn quit(&self) -> std::result::Result<(), LoopError> {
        self.sender
            .send(Envelope::Quit)
            .map_err(|_| LoopError::Disconnected)
    }
}

/// A single-threaded message loop with one-shot timers.
pub struct MessageLoop<M> {
    sender: Sender<Envelope<M>>,
    receiver: Receiver<Envelope<M>>,
    timers: TimerManager,
    affinity: ThreadAffinity,
}

impl<M> std::fmt::Debug for MessageLoop<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLoop")
            .field("queued", &self.receiver.len())
            .field("timers", &self.timers.active_count())
            .field("affinity", &self.affinity)
            .finish()
    }
}

impl<M: Send> Default for MessageLoop<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send> MessageLoop<M> {
    /// Create a loop bound to the current thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            timers: TimerManager::new(),
            affinity: ThreadAffinity::current(),
        }
    }

    /// Get a proxy for posting from other threads.
    pub fn proxy(&self) -> LoopProxy<M> {
        LoopProxy {
            sender: self.sender.clone(),
        }
    }

    /// The thread this loop belongs to.
    pub fn affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    /// Start a one-shot timer relative to `now`.
    pub fn start_timer_at(&mut self, now: Instant, duration: Duration) -> TimerId {
        self.affinity.debug_assert_same_thread();
        self.timers.start_one_shot_at(now, duration)
    }

    /// Cancel a pending timer.
    pub fn stop_timer(&mut self, id: TimerId) -> Result<()> {
        self.affinity.debug_assert_same_thread();
        self.timers.stop(id)
    }

    /// Whether a timer is still pending.
    pub fn is_timer_active(&self, id: TimerId) -> bool {
        self.timers.is_active(id)
    }

    /// The deadline of a pending timer.
    pub fn timer_deadline(&self, id: TimerId) -> Option<Instant> {
        self.timers.deadline(id)
    }

    /// Number of messages waiting to be pumped.
    pub fn pending_messages(&self) -> usize {
        self.receiver.len()
    }

    /// Collect everything that is ready at `now` without blocking.
    ///
    /// Events come out in priority order: expired timers in deadline order,
    /// then posted messages in FIFO order, then a quit request if one arrived.
    pub fn pump_at(&mut self, now: Instant) -> Vec<LoopEvent<M>> {
        self.affinity.debug_assert_same_thread();

        let mut quit = false;
        let mut messages = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(Envelope::Message(message)) => messages.push(LoopEvent::Message(message)),
                Ok(Envelope::Quit) => quit = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let mut events: Vec<LoopEvent<M>> = self
            .timers
            .process_expired_at(now)
            .into_iter()
            .map(|id| LoopEvent::Timer { id })
            .collect();
        events.extend(messages);
        if quit {
            events.push(LoopEvent::Quit);
        }

        if !events.is_empty() {
            tracing::trace!(target: "dashstack_core::loop", count = events.len(), "pumped events");
        }
        events
    }

    /// Block for at most `max_wait` (less if a timer is due sooner) and return
    /// whatever became ready, in the same order as [`pump_at`](Self::pump_at).
    ///
    /// Returns an empty vector on timeout.
    pub fn wait_events(&mut self, max_wait: Duration) -> Vec<LoopEvent<M>> {
        let ready = self.pump_at(Instant::now());
        if !ready.is_empty() {
            return ready;
        }

        let wait = self
            .timers
            .time_until_next_at(Instant::now())
            .unwrap_or(max_wait)
            .min(max_wait);

        let first = match self.receiver.recv_timeout(wait) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) => return self.pump_at(Instant::now()),
            Err(RecvTimeoutError::Disconnected) => return Vec::new(),
        };

        let mut events = self.pump_at(Instant::now());
        match first {
            Envelope::Message(message) => {
                // It arrived before anything else pump_at drained.
                let after_timers = events
                    .iter()
                    .position(|event| event.priority() <= EventPriority::Normal)
                    .unwrap_or(events.len());
                events.insert(after_timers, LoopEvent::Message(message));
            }
            Envelope::Quit => {
                if !events.last().is_some_and(LoopEvent::is_quit) {
                    events.push(LoopEvent::Quit);
                }
            }
        }
        events
    }

    /// Run the loop on the current thread until a quit request arrives or the
    /// handler breaks.
    pub fn run<F>(&mut self, mut handler: F)
    where
        F: FnMut(LoopEvent<M>) -> ControlFlow<()>,
    {
        tracing::debug!(target: "dashstack_core::loop", "message loop started");

        'outer: loop {
            for event in self.wait_events(IDLE_WAIT) {
                let quit = event.is_quit();
                if handler(event).is_break() || quit {
                    break 'outer;
                }
            }
        }

        tracing::debug!(target: "dashstack_core::loop", "message loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_fifo() {
        let mut ui_loop = MessageLoop::new();
        let proxy = ui_loop.proxy();
        for i in 0..5 {
            proxy.post(i).unwrap();
        }

        let events = ui_loop.pump_at(Instant::now());
        let values: Vec<i32> = events
            .into_iter()
            .filter_map(|e| match e {
                LoopEvent::Message(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_quit_is_delivered_after_queued_messages() {
        let mut ui_loop = MessageLoop::new();
        let proxy = ui_loop.proxy();
        proxy.quit().unwrap();
        proxy.post(1).unwrap();

        let events = ui_loop.pump_at(Instant::now());
        assert_eq!(events, vec![LoopEvent::Message(1), LoopEvent::Quit]);
    }

    #[test]
    fn test_post_after_drop_fails() {
        let ui_loop = MessageLoop::<u8>::new();
        let proxy = ui_loop.proxy();
        drop(ui_loop);
        assert_eq!(proxy.post(1), Err(LoopError::Disconnected));
    }

    #[test]
    fn test_run_stops_on_quit() {
        let mut ui_loop = MessageLoop::new();
        let proxy = ui_loop.proxy();

        let worker = std::thread::spawn(move || {
            proxy.post("a").unwrap();
            proxy.post("b").unwrap();
            proxy.quit().unwrap();
        });

        let mut seen = Vec::new();
        ui_loop.run(|event| {
            if let LoopEvent::Message(m) = event {
                seen.push(m);
            }
            ControlFlow::Continue(())
        });
        worker.join().unwrap();

        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_run_fires_timers() {
        let mut ui_loop = MessageLoop::<()>::new();
        let timer = ui_loop.start_timer_at(Instant::now(), Duration::from_millis(5));

        let mut fired = None;
        ui_loop.run(|event| match event {
            LoopEvent::Timer { id } => {
                fired = Some(id);
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        });

        assert_eq!(fired, Some(timer));
    }

    #[test]
    fn test_wait_events_times_out_empty() {
        let mut ui_loop = MessageLoop::<u8>::new();
        assert!(ui_loop.wait_events(Duration::from_millis(1)).is_empty());
    }

    #[test]
    fn test_wait_events_returns_posted_message() {
        let mut ui_loop = MessageLoop::new();
        let proxy = ui_loop.proxy();
        std::thread::spawn(move || {
            proxy.post(7u8).unwrap();
            proxy.quit().unwrap();
        })
        .join()
        .unwrap();

        let events = ui_loop.wait_events(Duration::from_millis(50));
        assert_eq!(events, vec![LoopEvent::Message(7), LoopEvent::Quit]);
    }
}
