//! Information templates: a titled key/value sheet with footer actions.

use serde::{Deserialize, Serialize};

use crate::element::ElementId;
use crate::model::button::{TextButton, position_of};
use crate::model::native::NativeInformation;
use crate::model::{ButtonSlot, Node};
use crate::payload::assign;

/// Maximum footer actions the host shows on an information sheet.
const MAX_ACTIONS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InfoLayout {
    #[default]
    Leading,
    TwoColumn,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InformationTemplate {
    pub element_id: ElementId,
    pub title: String,
    #[serde(default)]
    pub layout: InfoLayout,
    #[serde(default)]
    pub items: Vec<InfoItem>,
    #[serde(default)]
    pub actions: Vec<TextButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InformationDelta {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub layout: Option<InfoLayout>,
    #[serde(default)]
    pub items: Option<Vec<InfoItem>>,
    #[serde(default)]
    pub actions: Option<Vec<TextButton>>,
}

impl InformationTemplate {
    pub(crate) fn apply(&mut self, delta: InformationDelta) -> bool {
        let mut changed = assign(&mut self.title, delta.title);
        changed |= assign(&mut self.layout, delta.layout);
        changed |= assign(&mut self.items, delta.items);
        changed |= assign(&mut self.actions, delta.actions);
        changed
    }

    pub(crate) fn enforce_limits(&mut self) -> bool {
        crate::payload::truncate(&mut self.actions, MAX_ACTIONS, "actions", &self.element_id)
    }

    pub(crate) fn locate(&self, id: &ElementId) -> Option<Node> {
        position_of(self.actions.iter().map(|a| &a.element_id), id)
            .map(|i| Node::Button(ButtonSlot::Action(i)))
    }

    pub fn to_native(&self) -> NativeInformation {
        NativeInformation {
            element_id: self.element_id.clone(),
            title: self.title.clone(),
            layout: self.layout,
            items: self
                .items
                .iter()
                .map(|item| (item.title.clone(), item.detail.clone()))
                .collect(),
            actions: self.actions.iter().map(TextButton::to_native).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actions_are_capped() {
        let mut template: InformationTemplate = serde_json::from_value(json!({
            "elementId": "info",
            "title": "Order",
            "layout": "twoColumn",
            "items": [{"title": "Total", "detail": "$12"}],
            "actions": [
                {"elementId": "a1", "title": "Call"},
                {"elementId": "a2", "title": "Directions"},
                {"elementId": "a3", "title": "Share"},
                {"elementId": "a4", "title": "Cancel", "style": "cancel"}
            ]
        }))
        .unwrap();

        assert!(template.enforce_limits());
        assert_eq!(template.actions.len(), 3);
        assert_eq!(template.layout, InfoLayout::TwoColumn);
        assert_eq!(
            template.locate(&"a2".into()),
            Some(Node::Button(ButtonSlot::Action(1)))
        );
        assert_eq!(template.locate(&"a4".into()), None);
    }
}
