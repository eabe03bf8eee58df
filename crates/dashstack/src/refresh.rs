//! Debounced full refresh.
//!
//! A full refresh redraws every visible screen, and upstream state changes can
//! ask for one many times in quick succession. [`RefreshDebouncer`] keeps at
//! most one refresh timer on the session's message loop: every request cancels
//! the pending timer and starts a new one, so only the last request of a burst
//! fires, one interval after it was made.

use std::time::{Duration, Instant};

use dashstack_core::{MessageLoop, TimerId};

#[derive(Debug, Default)]
pub struct RefreshDebouncer {
    pending: Option<TimerId>,
    requested: u64,
    executed: u64,
}

impl RefreshDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a refresh `interval` after `now`, replacing any pending one.
    pub fn request_at<M: Send>(
        &mut self,
        ui_loop: &mut MessageLoop<M>,
        now: Instant,
        interval: Duration,
    ) -> TimerId {
        if let Some(previous) = self.pending.take() {
            // Already fired or stopped is fine; either way it no longer counts.
            let _ = ui_loop.stop_timer(previous);
        }
        let id = ui_loop.start_timer_at(now, interval);
        self.pending = Some(id);
        self.requested += 1;
        tracing::trace!(
            target: "dashstack::refresh",
            interval_ms = interval.as_millis() as u64,
            requested = self.requested,
            "refresh scheduled"
        );
        id
    }

    /// Claim a fired timer. Returns `true` if it is the pending refresh and
    /// the refresh should run now.
    pub fn on_timer(&mut self, id: TimerId) -> bool {
        if self.pending != Some(id) {
            return false;
        }
        self.pending = None;
        self.executed += 1;
        tracing::debug!(
            target: "dashstack::refresh",
            requested = self.requested,
            executed = self.executed,
            "refresh due"
        );
        true
    }

    pub fn cancel<M: Send>(&mut self, ui_loop: &mut MessageLoop<M>) -> bool {
        match self.pending.take() {
            Some(id) => ui_loop.stop_timer(id).is_ok(),
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Requests made so far.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Refreshes that actually ran.
    pub fn executed(&self) -> u64 {
        self.executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashstack_core::LoopEvent;

    fn fire(debouncer: &mut RefreshDebouncer, ui_loop: &mut MessageLoop<()>, at: Instant) -> usize {
        ui_loop
            .pump_at(at)
            .into_iter()
            .filter(|event| matches!(event, LoopEvent::Timer { id } if debouncer.on_timer(*id)))
            .count()
    }

    #[test]
    fn test_burst_coalesces_to_one_refresh_from_last_request() {
        let mut ui_loop = MessageLoop::new();
        let mut debouncer = RefreshDebouncer::new();
        let interval = Duration::from_millis(100);
        let start = Instant::now();

        let mut last = start;
        for i in 0..5 {
            last = start + Duration::from_millis(i * 30);
            debouncer.request_at(&mut ui_loop, last, interval);
        }

        // One interval after the first request, but inside the window of the
        // last one: nothing yet.
        assert_eq!(fire(&mut debouncer, &mut ui_loop, start + interval), 0);
        assert!(debouncer.is_pending());

        assert_eq!(fire(&mut debouncer, &mut ui_loop, last + interval), 1);
        assert_eq!(fire(&mut debouncer, &mut ui_loop, last + interval * 10), 0);
        assert_eq!(debouncer.requested(), 5);
        assert_eq!(debouncer.executed(), 1);
    }

    #[test]
    fn test_separate_bursts_each_refresh() {
        let mut ui_loop = MessageLoop::new();
        let mut debouncer = RefreshDebouncer::new();
        let interval = Duration::from_millis(50);
        let start = Instant::now();

        debouncer.request_at(&mut ui_loop, start, interval);
        assert_eq!(fire(&mut debouncer, &mut ui_loop, start + interval), 1);

        let later = start + Duration::from_secs(1);
        debouncer.request_at(&mut ui_loop, later, interval);
        assert_eq!(fire(&mut debouncer, &mut ui_loop, later + interval), 1);
        assert_eq!(debouncer.executed(), 2);
    }

    #[test]
    fn test_cancel_stops_pending() {
        let mut ui_loop = MessageLoop::new();
        let mut debouncer = RefreshDebouncer::new();
        let start = Instant::now();
        debouncer.request_at(&mut ui_loop, start, Duration::from_millis(10));

        assert!(debouncer.cancel(&mut ui_loop));
        assert!(!debouncer.cancel(&mut ui_loop));
        assert_eq!(fire(&mut debouncer, &mut ui_loop, start + Duration::from_secs(1)), 0);
    }

    #[test]
    fn test_foreign_timer_is_not_claimed() {
        let mut ui_loop = MessageLoop::<()>::new();
        let mut debouncer = RefreshDebouncer::new();
        let other = ui_loop.start_timer_at(Instant::now(), Duration::ZERO);
        assert!(!debouncer.on_timer(other));
    }
}
