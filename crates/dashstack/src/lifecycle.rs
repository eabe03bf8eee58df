//! Connection state, driven entirely by host lifecycle callbacks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::OutboundEvent;

/// Connection status reported to the remote driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Foreground,
    Background,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Foreground => "foreground",
            Self::Background => "background",
        };
        f.write_str(name)
    }
}

/// A host session lifecycle callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostLifecycle {
    Create,
    Start,
    Resume,
    Pause,
    Stop,
    Destroy,
}

impl HostLifecycle {
    /// The state a callback puts the connection in.
    pub fn target_state(self) -> ConnectionState {
        match self {
            Self::Create | Self::Start => ConnectionState::Connecting,
            Self::Resume => ConnectionState::Foreground,
            Self::Pause | Self::Stop => ConnectionState::Background,
            Self::Destroy => ConnectionState::Disconnected,
        }
    }
}

/// Tracks the connection state.
///
/// Every callback produces a `connection-changed` event, even when the state
/// does not change: each callback is a distinct host event.
#[derive(Debug, Default)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    transitions: u64,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of callbacks handled.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn on_callback(&mut self, callback: HostLifecycle) -> OutboundEvent {
        let previous = self.state;
        self.state = callback.target_state();
        self.transitions += 1;
        tracing::debug!(
            target: "dashstack::lifecycle",
            ?callback,
            from = %previous,
            to = %self.state,
            "host lifecycle callback"
        );
        OutboundEvent::ConnectionChanged { status: self.state }
    }
}
