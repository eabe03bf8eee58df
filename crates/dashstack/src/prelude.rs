//! Commonly used types, for glob import:
//!
//! ```
//! use dashstack::prelude::*;
//! ```

// ============================================================================
// Session
// ============================================================================

pub use crate::session::{HostInteraction, Session, SessionHandle, SessionMessage};
pub use crate::config::{BridgeConfig, Limits};
pub use crate::error::{BridgeError, Result};

// ============================================================================
// Protocol
// ============================================================================

pub use crate::protocol::{
    ChannelSink, Command, CommandResult, EventSink, Method, OutboundEvent,
};
pub use crate::lifecycle::{ConnectionState, HostLifecycle};

// ============================================================================
// Host
// ============================================================================

pub use crate::host::{HostError, HostHandle, HostSurface, MemoryHost};
pub use crate::model::native::NativeTemplate;

// ============================================================================
// Templates and Elements
// ============================================================================

pub use crate::element::{ElementId, ImageHandle, ImageRef};
pub use crate::model::{Template, TemplateDelta, TemplateKind};

// ============================================================================
// Images
// ============================================================================

pub use crate::image::{ImageResolver, PooledImageResolver};
