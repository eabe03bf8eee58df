//! Events delivered by the UI-thread message loop.

use crate::timer::TimerId;

/// Priority levels for loop events.
/// Higher priority events are delivered first within the same pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum EventPriority {
    /// Shutdown, honored after everything already queued.
    Low = 0,
    /// Messages posted by background work or transports.
    #[default]
    Normal = 1,
    /// Timers.
    High = 2,
}

/// An event handed to the owner of a [`crate::MessageLoop`].
///
/// `M` is the owner's message type; posting typed messages replaces shared
/// mutable closures captured across threads.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent<M> {
    /// A one-shot timer has fired.
    Timer {
        /// The timer that fired.
        id: TimerId,
    },

    /// A message posted through a [`crate::LoopProxy`].
    Message(M),

    /// Request to stop the loop.
    Quit,
}

impl<M> LoopEvent<M> {
    /// Get the priority of this event.
    pub fn priority(&self) -> EventPriority {
        match self {
            Self::Quit => EventPriority::Low,
            Self::Timer { .. } => EventPriority::High,
            Self::Message(_) => EventPriority::Normal,
        }
    }

    /// Whether this is a quit request.
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Quit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_priorities() {
        let mut keys: SlotMap<TimerId, ()> = SlotMap::with_key();
        let id = keys.insert(());

        assert_eq!(LoopEvent::<()>::Quit.priority(), EventPriority::Low);
        assert_eq!(LoopEvent::<()>::Timer { id }.priority(), EventPriority::High);
        assert_eq!(LoopEvent::Message(1).priority(), EventPriority::Normal);
        assert!(EventPriority::High > EventPriority::Normal);
        assert!(LoopEvent::<u8>::Quit.is_quit());
    }
}
