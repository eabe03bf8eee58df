//! Presentable templates: alerts, action sheets and voice control.

use serde::Deserialize;

use crate::element::ElementId;
use crate::error::{BridgeError, Result};
use crate::model::button::{TextButton, position_of};
use crate::model::native::{NativeActionSheet, NativeAlert, NativeVoiceControl};
use crate::model::{ButtonSlot, Node};
use crate::payload::{assign, double_option};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTemplate {
    pub element_id: ElementId,
    /// Title variants, longest first; the host picks the one that fits.
    pub title_variants: Vec<String>,
    #[serde(default)]
    pub actions: Vec<TextButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDelta {
    #[serde(default)]
    pub title_variants: Option<Vec<String>>,
    #[serde(default)]
    pub actions: Option<Vec<TextButton>>,
}

impl AlertTemplate {
    pub(crate) fn apply(&mut self, delta: AlertDelta) -> bool {
        assign(&mut self.title_variants, delta.title_variants) | assign(&mut self.actions, delta.actions)
    }

    pub(crate) fn locate(&self, id: &ElementId) -> Option<Node> {
        locate_action(&self.actions, id)
    }

    pub fn to_native(&self) -> NativeAlert {
        NativeAlert {
            element_id: self.element_id.clone(),
            title_variants: self.title_variants.clone(),
            actions: self.actions.iter().map(TextButton::to_native).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSheetTemplate {
    pub element_id: ElementId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub actions: Vec<TextButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSheetDelta {
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub message: Option<Option<String>>,
    #[serde(default)]
    pub actions: Option<Vec<TextButton>>,
}

impl ActionSheetTemplate {
    pub(crate) fn apply(&mut self, delta: ActionSheetDelta) -> bool {
        assign(&mut self.title, delta.title)
            | assign(&mut self.message, delta.message)
            | assign(&mut self.actions, delta.actions)
    }

    pub(crate) fn locate(&self, id: &ElementId) -> Option<Node> {
        locate_action(&self.actions, id)
    }

    pub fn to_native(&self) -> NativeActionSheet {
        NativeActionSheet {
            element_id: self.element_id.clone(),
            title: self.title.clone(),
            message: self.message.clone(),
            actions: self.actions.iter().map(TextButton::to_native).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub identifier: String,
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub repeats: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceControlTemplate {
    pub element_id: ElementId,
    pub states: Vec<VoiceState>,
    #[serde(default)]
    pub active_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceControlDelta {
    #[serde(default)]
    pub states: Option<Vec<VoiceState>>,
    #[serde(default, deserialize_with = "double_option")]
    pub active_state: Option<Option<String>>,
}

impl VoiceControlTemplate {
    /// Switching to a state identifier that is not declared is rejected
    /// without applying any part of the delta.
    pub(crate) fn apply(&mut self, delta: VoiceControlDelta) -> Result<bool> {
        let states = delta.states.as_ref().unwrap_or(&self.states);
        let active = match &delta.active_state {
            Some(active) => active.as_ref(),
            None => self.active_state.as_ref(),
        };
        if let Some(active) = active {
            if !states.iter().any(|s| &s.identifier == active) {
                return Err(BridgeError::bad_arguments(format!(
                    "unknown voice control state `{active}`"
                )));
            }
        }

        Ok(assign(&mut self.states, delta.states) | assign(&mut self.active_state, delta.active_state))
    }

    pub fn active(&self) -> Option<&VoiceState> {
        let active = self.active_state.as_deref()?;
        self.states.iter().find(|s| s.identifier == active)
    }

    pub fn to_native(&self) -> NativeVoiceControl {
        let active = self.active();
        NativeVoiceControl {
            element_id: self.element_id.clone(),
            active_titles: active.map(|s| s.titles.clone()).unwrap_or_default(),
            active_state: active.map(|s| s.identifier.clone()),
            repeats: active.is_some_and(|s| s.repeats),
        }
    }
}

fn locate_action(actions: &[TextButton], id: &ElementId) -> Option<Node> {
    position_of(actions.iter().map(|a| &a.element_id), id).map(|i| Node::Button(ButtonSlot::Action(i)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn voice() -> VoiceControlTemplate {
        serde_json::from_value(json!({
            "elementId": "voice",
            "states": [
                {"identifier": "listening", "titles": ["Listening…"], "repeats": true},
                {"identifier": "done", "titles": ["Done"]}
            ],
            "activeState": "listening"
        }))
        .unwrap()
    }

    #[test]
    fn test_voice_state_switch() {
        let mut template = voice();
        assert!(template.to_native().repeats);

        let delta: VoiceControlDelta = serde_json::from_value(json!({"activeState": "done"})).unwrap();
        assert!(template.apply(delta).unwrap());
        let native = template.to_native();
        assert_eq!(native.active_state.as_deref(), Some("done"));
        assert_eq!(native.active_titles, vec!["Done".to_string()]);
    }

    #[test]
    fn test_unknown_voice_state_is_rejected_whole() {
        let mut template = voice();
        let delta: VoiceControlDelta =
            serde_json::from_value(json!({"activeState": "thinking"})).unwrap();
        let err = template.apply(delta).unwrap_err();
        assert_eq!(err.code(), "bad_arguments");
        assert_eq!(template.active_state.as_deref(), Some("listening"));
    }

    #[test]
    fn test_alert_actions_are_addressable() {
        let alert: AlertTemplate = serde_json::from_value(json!({
            "elementId": "alert",
            "titleVariants": ["Delete download?"],
            "actions": [
                {"elementId": "ok", "title": "Delete", "style": "destructive"},
                {"elementId": "cancel", "title": "Cancel", "style": "cancel"}
            ]
        }))
        .unwrap();
        assert_eq!(
            alert.locate(&"cancel".into()),
            Some(Node::Button(ButtonSlot::Action(1)))
        );
        assert_eq!(alert.to_native().actions.len(), 2);
    }
}
