//! The command/event protocol spoken with the remote driver.
//!
//! Inbound commands are `{method, args}`; each produces exactly one
//! [`CommandResult`]. Outbound events are fire-and-forget
//! [`OutboundEvent`]s pushed through the registered [`EventSink`].

pub mod event;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::element::ElementId;
use crate::error::{BridgeError, Result};

pub use event::{ChannelSink, EventChannel, EventSink, OutboundEvent};

/// An inbound command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

impl Command {
    pub fn new(method: impl Into<String>, args: Value) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// A command without arguments.
    pub fn bare(method: Method) -> Self {
        Self::new(method.name(), Value::Null)
    }
}

/// Recognized command methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    SetRootTemplate,
    PushTemplate,
    PopTemplate,
    PopToRoot,
    PresentModal,
    ClosePresented,
    UpdateTemplate,
    UpdateItem,
    AcknowledgeSelection,
    GetConfig,
    ForceRefresh,
    GetStack,
}

impl Method {
    pub const ALL: [Method; 12] = [
        Self::SetRootTemplate,
        Self::PushTemplate,
        Self::PopTemplate,
        Self::PopToRoot,
        Self::PresentModal,
        Self::ClosePresented,
        Self::UpdateTemplate,
        Self::UpdateItem,
        Self::AcknowledgeSelection,
        Self::GetConfig,
        Self::ForceRefresh,
        Self::GetStack,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SetRootTemplate => "set-root-template",
            Self::PushTemplate => "push-template",
            Self::PopTemplate => "pop-template",
            Self::PopToRoot => "pop-to-root",
            Self::PresentModal => "present-modal",
            Self::ClosePresented => "close-presented",
            Self::UpdateTemplate => "update-template",
            Self::UpdateItem => "update-item",
            Self::AcknowledgeSelection => "acknowledge-selection",
            Self::GetConfig => "get-config",
            Self::ForceRefresh => "force-refresh",
            Self::GetStack => "get-stack",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The single result every command produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl CommandResult {
    pub fn success(value: Value) -> Self {
        Self {
            ok: true,
            value: Some(value),
            error: None,
            code: None,
        }
    }

    pub fn failure(err: &BridgeError) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }

    pub(crate) fn unknown_method(name: &str) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(format!("unknown method `{name}`")),
            code: Some("unknown_method".to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// The stable failure code, if the command failed.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Typed, fallible access to a command's argument bundle.
///
/// A missing or mistyped required argument is [`BridgeError::BadArguments`];
/// nothing is ever defaulted silently.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Args<'a> {
    /// `null` is accepted as an empty bundle.
    pub fn new(args: &'a Value) -> Result<Self> {
        match args {
            Value::Object(map) => Ok(Self { map: Some(map) }),
            Value::Null => Ok(Self { map: None }),
            _ => Err(BridgeError::bad_arguments("arguments must be an object")),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map?.get(key).filter(|value| !value.is_null())
    }

    pub fn value(&self, key: &str) -> Result<&'a Value> {
        self.get(key)
            .ok_or_else(|| BridgeError::bad_arguments(format!("missing required argument `{key}`")))
    }

    pub fn str(&self, key: &str) -> Result<&'a str> {
        self.value(key)?
            .as_str()
            .ok_or_else(|| BridgeError::bad_arguments(format!("argument `{key}` must be a string")))
    }

    pub fn element_id(&self, key: &str) -> Result<ElementId> {
        self.str(key).map(ElementId::new)
    }

    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get(key)
            .map(|value| {
                value.as_u64().ok_or_else(|| {
                    BridgeError::bad_arguments(format!(
                        "argument `{key}` must be a non-negative integer"
                    ))
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_names_round_trip() {
        for method in Method::ALL {
            assert_eq!(Method::parse(method.name()), Some(method));
        }
        assert_eq!(Method::parse("setRoot"), None);
    }

    #[test]
    fn test_missing_argument_is_bad_arguments() {
        let raw = json!({"elementId": "x"});
        let args = Args::new(&raw).unwrap();
        assert_eq!(args.element_id("elementId").unwrap(), ElementId::new("x"));

        let err = args.value("delta").unwrap_err();
        assert_eq!(err.code(), "bad_arguments");
        assert!(err.to_string().contains("delta"));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let raw = json!({"count": null});
        let args = Args::new(&raw).unwrap();
        assert_eq!(args.optional_u64("count").unwrap(), None);

        let raw = json!({"count": -1});
        let args = Args::new(&raw).unwrap();
        assert!(args.optional_u64("count").is_err());
    }

    #[test]
    fn test_non_object_args_rejected() {
        assert!(Args::new(&json!([1, 2])).is_err());
        assert!(Args::new(&Value::Null).is_ok());
    }

    #[test]
    fn test_result_serialization_omits_empty_fields() {
        let ok = CommandResult::success(json!(true));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"ok": true, "value": true}));

        let failed = CommandResult::failure(&BridgeError::StackDepthExceeded { max: 5 });
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "ok": false,
                "error": "stack depth limit of 5 reached",
                "code": "stack_depth_exceeded"
            })
        );
    }
}
