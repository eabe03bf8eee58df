//! One-shot timers driven by the message loop.
//!
//! Every method takes the current instant explicitly so callers (and tests)
//! control the clock.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use slotmap::{SlotMap, new_key_type};

use crate::error::{Result, TimerError};

new_key_type! {
    /// Handle to a pending timer. Stale once the timer fires or is stopped.
    pub struct TimerId;
}

#[derive(Debug)]
struct TimerData {
    deadline: Instant,
}

/// Deadline-ordered heap entry; stopped timers leave stale entries behind.
#[derive(Debug, Clone, Copy)]
struct QueuedDeadline {
    id: TimerId,
    at: Instant,
}

impl PartialEq for QueuedDeadline {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

impl Eq for QueuedDeadline {}

impl PartialOrd for QueuedDeadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedDeadline {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest deadline on top.
        other.at.cmp(&self.at)
    }
}

/// Manages pending one-shot timers.
#[derive(Debug)]
pub struct TimerManager {
    timers: SlotMap<TimerId, TimerData>,
    queue: BinaryHeap<QueuedDeadline>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self {
            timers: SlotMap::with_key(),
            queue: BinaryHeap::new(),
        }
    }

    /// Start a one-shot timer that fires `duration` after `now`.
    pub fn start_one_shot_at(&mut self, now: Instant, duration: Duration) -> TimerId {
        let deadline = now + duration;
        let id = self.timers.insert(TimerData { deadline });
        self.queue.push(QueuedDeadline { id, at: deadline });
        tracing::trace!(target: "dashstack_core::timer", ?id, ?duration, "timer started");
        id
    }

    /// Stop and remove a timer.
    ///
    /// Stale queue entries are skipped lazily when they reach the front.
    pub fn stop(&mut self, id: TimerId) -> Result<()> {
        if self.timers.remove(id).is_some() {
            tracing::trace!(target: "dashstack_core::timer", ?id, "timer stopped");
            Ok(())
        } else {
            Err(TimerError::InvalidTimerId.into())
        }
    }

    /// Check if a timer is still pending.
    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(id)
    }

    /// The instant at which a pending timer will fire.
    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.timers.get(id).map(|t| t.deadline)
    }

    /// How long after `now` the earliest pending timer fires.
    pub fn time_until_next_at(&mut self, now: Instant) -> Option<Duration> {
        while let Some(entry) = self.queue.peek() {
            if self.timers.contains_key(entry.id) {
                break;
            }
            self.queue.pop();
        }

        self.queue
            .peek()
            .map(|entry| entry.at.saturating_duration_since(now))
    }

    /// Remove and return every timer whose deadline is at or before `now`,
    /// in deadline order.
    #[tracing::instrument(skip(self), target = "dashstack_core::timer", level = "trace")]
    pub fn process_expired_at(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired = Vec::new();

        while let Some(entry) = self.queue.peek() {
            if entry.at > now {
                break;
            }

            let Some(entry) = self.queue.pop() else {
                break;
            };

            if self.timers.remove(entry.id).is_some() {
                tracing::trace!(target: "dashstack_core::timer", id = ?entry.id, "timer fired");
                fired.push(entry.id);
            }
        }

        fired
    }

    /// Pending timers.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}
