//! Error types for the dashstack core.

use std::fmt;

/// The main error type for core operations.
#[derive(Debug)]
pub enum CoreError {
    /// Timer-related error.
    Timer(TimerError),
    /// Message loop error.
    Loop(LoopError),
    /// Worker pool error.
    Pool(PoolError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer(err) => write!(f, "Timer error: {err}"),
            Self::Loop(err) => write!(f, "Message loop error: {err}"),
            Self::Pool(err) => write!(f, "Worker pool error: {err}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timer(err) => Some(err),
            Self::Loop(err) => Some(err),
            Self::Pool(err) => Some(err),
        }
    }
}

/// Timer-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The timer ID is invalid or has already been removed.
    InvalidTimerId,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimerId => write!(f, "Invalid or expired timer ID"),
        }
    }
}

impl std::error::Error for TimerError {}

/// Message loop errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    /// The loop has been dropped; nothing will receive the message.
    Disconnected,
    /// A reply slot was dropped before a value was delivered.
    ReplyDropped,
    /// Waiting for a reply timed out.
    ReplyTimeout,
    /// A blocking call was made from the loop's own thread, which would
    /// never get to handle it.
    WouldBlockOwner,
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "The message loop is no longer running"),
            Self::ReplyDropped => write!(f, "Reply slot dropped without a value"),
            Self::ReplyTimeout => write!(f, "Timed out waiting for a reply"),
            Self::WouldBlockOwner => {
                write!(f, "Blocking call on the message loop's own thread would deadlock")
            }
        }
    }
}

impl std::error::Error for LoopError {}

/// Worker pool errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Failed to build the underlying rayon pool.
    CreationFailed(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreationFailed(msg) => write!(f, "Failed to create worker pool: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<TimerError> for CoreError {
    fn from(err: TimerError) -> Self {
        Self::Timer(err)
    }
}

impl From<LoopError> for CoreError {
    fn from(err: LoopError) -> Self {
        Self::Loop(err)
    }
}

impl From<PoolError> for CoreError {
    fn from(err: PoolError) -> Self {
        Self::Pool(err)
    }
}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
