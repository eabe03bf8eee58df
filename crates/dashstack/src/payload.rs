//! Boundary decoding of remote payloads.
//!
//! Remote commands carry untyped JSON. Everything is decoded here, once, into
//! the typed model: a `runtimeType` discriminant selects the template kind and
//! serde does the rest. Unknown discriminants fail with
//! [`BridgeError::UnsupportedTemplateType`]; anything else that does not fit
//! the typed shape fails with [`BridgeError::BadArguments`].

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::Limits;
use crate::element::ElementId;
use crate::error::{BridgeError, Result};
use crate::model::{ItemDelta, Template, TemplateDelta, TemplateKind};

/// Decode a construct payload into a template, truncating content that
/// exceeds the host limits.
pub fn decode_template(runtime_type: &str, payload: Value, limits: &Limits) -> Result<Template> {
    let kind = TemplateKind::from_wire(runtime_type)
        .ok_or_else(|| BridgeError::UnsupportedTemplateType(runtime_type.to_string()))?;
    if !payload.is_object() {
        return Err(BridgeError::bad_arguments(format!(
            "{runtime_type} payload must be an object"
        )));
    }

    let mut template = Template::from_value(kind, payload)?;
    template.enforce_limits(limits);
    Ok(template)
}

/// Decode an update delta for a template of the given kind.
pub fn decode_template_delta(kind: TemplateKind, delta: Value) -> Result<TemplateDelta> {
    if !delta.is_object() {
        return Err(BridgeError::bad_arguments("delta must be an object"));
    }
    TemplateDelta::from_value(kind, delta)
}

/// Decode an update delta for a list item.
pub fn decode_item_delta(delta: Value) -> Result<ItemDelta> {
    if !delta.is_object() {
        return Err(BridgeError::bad_arguments("delta must be an object"));
    }
    Ok(serde_json::from_value(delta)?)
}

/// Distinguishes an absent key (`None`) from an explicit `null`
/// (`Some(None)`), so deltas can clear optional fields.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn default_true() -> bool {
    true
}

/// Overwrite `slot` with `value` if present and different.
pub(crate) fn assign<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

/// Cap `items` at `max`, logging what was dropped.
pub(crate) fn truncate<T>(items: &mut Vec<T>, max: usize, what: &'static str, owner: &ElementId) -> bool {
    if items.len() <= max {
        return false;
    }
    tracing::warn!(
        target: "dashstack::payload",
        element_id = %owner,
        what,
        requested = items.len(),
        limit = max,
        "truncating to host limit"
    );
    items.truncate(max);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_runtime_type() {
        let err = decode_template("TabBarTemplate", json!({}), &Limits::default()).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedTemplateType(ref t) if t == "TabBarTemplate"));
    }

    #[test]
    fn test_malformed_payload_is_bad_arguments() {
        let err = decode_template("ListTemplate", json!({"title": "no id"}), &Limits::default())
            .unwrap_err();
        assert_eq!(err.code(), "bad_arguments");

        let err = decode_template("GridTemplate", json!("grid"), &Limits::default()).unwrap_err();
        assert_eq!(err.code(), "bad_arguments");
    }

    #[test]
    fn test_assign_reports_changes_only() {
        let mut value = 3;
        assert!(!assign(&mut value, None));
        assert!(!assign(&mut value, Some(3)));
        assert!(assign(&mut value, Some(4)));
        assert_eq!(value, 4);
    }

    #[test]
    fn test_explicit_null_clears() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "double_option")]
            detail: Option<Option<String>>,
        }

        let absent: Probe = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.detail, None);
        let cleared: Probe = serde_json::from_value(json!({"detail": null})).unwrap();
        assert_eq!(cleared.detail, Some(None));
        let set: Probe = serde_json::from_value(json!({"detail": "x"})).unwrap();
        assert_eq!(set.detail, Some(Some("x".to_string())));
    }
}
