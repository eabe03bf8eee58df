//! dashstack - a template stack bridge for host-owned car UI surfaces.
//!
//! A remote driver describes screens as declarative templates (lists, grids,
//! information panels, maps, alerts, action sheets, voice control). dashstack
//! decodes them, keeps the navigation stack the driver believes in consistent
//! with the stack the host actually shows, pushes incremental updates into
//! already-displayed screens, and turns host interactions back into outbound
//! events.
//!
//! The pieces:
//!
//! - [`payload`] and [`model`]: typed templates decoded from loose JSON, with
//!   host limits enforced and incremental deltas applied in place
//! - [`registry`] and [`stack`]: the element registry and the root / pushed /
//!   modal navigation state machine
//! - [`protocol`]: inbound commands, their single results, outbound events
//! - [`session`]: one connected head unit, tying the above to a [`HostSurface`]
//!   on a UI-thread message loop
//!
//! # Example
//!
//! ```
//! use dashstack::prelude::*;
//! use serde_json::json;
//!
//! let mut session = Session::new(BridgeConfig::default(), MemoryHost::new()).unwrap();
//! let (sink, events) = ChannelSink::bounded(16);
//! session.register_sink(sink);
//!
//! session.dispatch(Command::new(
//!     "set-root-template",
//!     json!({
//!         "runtimeType": "ListTemplate",
//!         "template": {
//!             "elementId": "home",
//!             "sections": [{"elementId": "s", "items": [{"elementId": "row", "text": "Play"}]}]
//!         }
//!     }),
//! ));
//! session.on_interaction(HostInteraction::ItemSelected(ElementId::new("row")));
//!
//! let types: Vec<_> = events.try_iter().map(|e| e.type_name()).collect();
//! assert_eq!(types, vec!["active-template-changed", "item-selected"]);
//! ```

pub mod config;
pub mod element;
pub mod error;
pub mod host;
pub mod image;
pub mod lifecycle;
pub mod model;
pub mod payload;
pub mod prelude;
pub mod protocol;
pub mod refresh;
pub mod registry;
pub mod session;
pub mod stack;

pub use config::{BridgeConfig, Limits};
pub use element::{ElementId, ImageHandle, ImageRef};
pub use error::{BridgeError, Result};
pub use host::{HostError, HostHandle, HostSurface, MemoryHost};
pub use lifecycle::{ConnectionState, HostLifecycle};
pub use model::{Template, TemplateKind};
pub use protocol::{Command, CommandResult, Method, OutboundEvent};
pub use session::{HostInteraction, Session, SessionHandle, SessionMessage};

pub use dashstack_core;

static_assertions::assert_impl_all!(SessionHandle: Send, Sync, Clone);
static_assertions::assert_impl_all!(SessionMessage: Send);
static_assertions::assert_impl_all!(image::PooledImageResolver: Send, Sync);
static_assertions::assert_impl_all!(protocol::ChannelSink: Send);
