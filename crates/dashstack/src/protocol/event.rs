//! Outbound events and the sink they are delivered through.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::Serialize;

use crate::element::ElementId;
use crate::lifecycle::ConnectionState;

/// An unsolicited host → remote event.
///
/// Serializes as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum OutboundEvent {
    ConnectionChanged {
        status: ConnectionState,
    },
    #[serde(rename_all = "camelCase")]
    ActiveTemplateChanged {
        element_id: ElementId,
    },
    #[serde(rename_all = "camelCase")]
    PresentationChanged {
        element_id: ElementId,
        popped: bool,
    },
    #[serde(rename_all = "camelCase")]
    ItemSelected {
        element_id: ElementId,
    },
    #[serde(rename_all = "camelCase")]
    BackButtonPressed {
        element_id: ElementId,
    },
    #[serde(rename_all = "camelCase")]
    ButtonPressed {
        element_id: ElementId,
    },
    #[serde(rename_all = "camelCase")]
    SearchTextChanged {
        element_id: ElementId,
        text: String,
    },
}

impl OutboundEvent {
    /// The wire `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ConnectionChanged { .. } => "connection-changed",
            Self::ActiveTemplateChanged { .. } => "active-template-changed",
            Self::PresentationChanged { .. } => "presentation-changed",
            Self::ItemSelected { .. } => "item-selected",
            Self::BackButtonPressed { .. } => "back-button-pressed",
            Self::ButtonPressed { .. } => "button-pressed",
            Self::SearchTextChanged { .. } => "search-text-changed",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Serializing plain data with string keys cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Receiver of outbound events.
pub trait EventSink: Send {
    fn deliver(&self, event: OutboundEvent);
}

impl<F> EventSink for F
where
    F: Fn(OutboundEvent) + Send,
{
    fn deliver(&self, event: OutboundEvent) {
        self(event)
    }
}

/// The single registered sink.
///
/// Registering replaces any previous sink. With no sink registered, events are
/// dropped, not queued.
#[derive(Default)]
pub struct EventChannel {
    sink: Option<Box<dyn EventSink>>,
    emitted: u64,
    dropped: u64,
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("has_sink", &self.sink.is_some())
            .field("emitted", &self.emitted)
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Box<dyn EventSink>) {
        if self.sink.replace(sink).is_some() {
            tracing::debug!(target: "dashstack::protocol", "replaced event sink");
        }
    }

    pub fn clear(&mut self) {
        self.sink = None;
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Events handed to a sink so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Events dropped for want of a sink.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn emit(&mut self, event: OutboundEvent) {
        match &self.sink {
            Some(sink) => {
                tracing::trace!(target: "dashstack::protocol", event = event.type_name(), "emit");
                self.emitted += 1;
                sink.deliver(event);
            }
            None => {
                self.dropped += 1;
                tracing::trace!(
                    target: "dashstack::protocol",
                    event = event.type_name(),
                    "no sink registered; dropping event"
                );
            }
        }
    }
}

/// A sink backed by a bounded queue, for handing events to a transport
/// thread.
///
/// When the queue is full the event is dropped; the running drop count is
/// logged on the first drop and at every power of two.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Sender<OutboundEvent>,
    capacity: usize,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<OutboundEvent>) {
        let (sender, receiver) = bounded(capacity);
        let sink = Self {
            sender,
            capacity,
            dropped: AtomicU64::new(0),
        };
        (sink, receiver)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: OutboundEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped.is_power_of_two() {
                    tracing::warn!(
                        target: "dashstack::protocol",
                        capacity = self.capacity,
                        dropped,
                        last = event.type_name(),
                        "outbound event queue full"
                    );
                }
            }
            Err(TrySendError::Disconnected(event)) => {
                tracing::debug!(
                    target: "dashstack::protocol",
                    event = event.type_name(),
                    "outbound receiver gone"
                );
            }
        }
    }
}
