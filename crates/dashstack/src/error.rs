//! Error types for the template bridge.

use dashstack_core::CoreError;
use thiserror::Error;

use crate::element::ElementId;

/// Result type used throughout the bridge.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Everything a command can fail with.
///
/// All variants except [`BridgeError::HostUnavailable`] are recovered at the
/// command boundary and reported to the remote driver as a failed result.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Unrecognized `runtimeType` discriminant in a construct command.
    #[error("unsupported template type `{0}`")]
    UnsupportedTemplateType(String),

    /// Push beyond the host's maximum stack depth.
    #[error("stack depth limit of {max} reached")]
    StackDepthExceeded {
        /// The configured maximum depth.
        max: usize,
    },

    /// The operation needs a current/root screen (or a presented one) that
    /// does not exist.
    #[error("no active screen: {0}")]
    NoActiveScreen(&'static str),

    /// The element is no longer part of the live template tree.
    #[error("element `{0}` is not live")]
    TargetNotFound(ElementId),

    /// The command payload is missing or has malformed fields.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// The host UI toolkit itself failed; the session cannot continue.
    #[error("host surface unavailable: {0}")]
    HostUnavailable(String),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Core runtime failure (message loop, worker pool).
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl BridgeError {
    /// Stable code reported to the remote driver alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedTemplateType(_) => "unsupported_template_type",
            Self::StackDepthExceeded { .. } => "stack_depth_exceeded",
            Self::NoActiveScreen(_) => "no_active_screen",
            Self::TargetNotFound(_) => "target_not_found",
            Self::BadArguments(_) => "bad_arguments",
            Self::HostUnavailable(_) => "host_unavailable",
            Self::Config(_) => "config_error",
            Self::Core(_) => "core_error",
        }
    }

    /// Whether the session must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::HostUnavailable(_))
    }

    pub(crate) fn bad_arguments(message: impl Into<String>) -> Self {
        Self::BadArguments(message.into())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadArguments(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_host_failures_are_fatal() {
        assert!(BridgeError::HostUnavailable("gone".into()).is_fatal());
        assert!(!BridgeError::StackDepthExceeded { max: 5 }.is_fatal());
        assert!(!BridgeError::TargetNotFound(ElementId::new("x")).is_fatal());
    }

    #[test]
    fn test_codes_and_messages() {
        let err = BridgeError::StackDepthExceeded { max: 5 };
        assert_eq!(err.code(), "stack_depth_exceeded");
        assert_eq!(err.to_string(), "stack depth limit of 5 reached");

        let err = BridgeError::UnsupportedTemplateType("TabBarTemplate".into());
        assert_eq!(err.code(), "unsupported_template_type");
        assert!(err.to_string().contains("TabBarTemplate"));
    }
}
