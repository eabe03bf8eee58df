//! Grid templates.

use serde::Deserialize;

use crate::config::Limits;
use crate::element::{ElementId, ImageRef, ImageSlot, collect_unresolved};
use crate::model::button::{BarButton, position_of};
use crate::model::native::{NativeGrid, NativeGridButton};
use crate::model::{ButtonSlot, Node};
use crate::payload::{assign, default_true, double_option, truncate};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridButton {
    pub element_id: ElementId,
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub image: Option<ImageSlot>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl GridButton {
    fn to_native(&self) -> NativeGridButton {
        NativeGridButton {
            element_id: self.element_id.clone(),
            titles: self.titles.clone(),
            image: self.image.as_ref().and_then(ImageSlot::resolved),
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridTemplate {
    pub element_id: ElementId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub buttons: Vec<GridButton>,
    #[serde(default)]
    pub leading_buttons: Vec<BarButton>,
    #[serde(default)]
    pub trailing_buttons: Vec<BarButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDelta {
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default)]
    pub buttons: Option<Vec<GridButton>>,
    #[serde(default)]
    pub leading_buttons: Option<Vec<BarButton>>,
    #[serde(default)]
    pub trailing_buttons: Option<Vec<BarButton>>,
}

impl GridTemplate {
    pub(crate) fn apply(&mut self, delta: GridDelta) -> bool {
        let mut changed = assign(&mut self.title, delta.title);
        changed |= assign(&mut self.buttons, delta.buttons);
        changed |= assign(&mut self.leading_buttons, delta.leading_buttons);
        changed |= assign(&mut self.trailing_buttons, delta.trailing_buttons);
        changed
    }

    pub(crate) fn enforce_limits(&mut self, limits: &Limits) -> bool {
        let id = &self.element_id;
        truncate(&mut self.buttons, limits.max_grid_buttons, "grid buttons", id)
            | truncate(&mut self.leading_buttons, limits.max_bar_buttons, "leading buttons", id)
            | truncate(&mut self.trailing_buttons, limits.max_bar_buttons, "trailing buttons", id)
    }

    pub(crate) fn locate(&self, id: &ElementId) -> Option<Node> {
        position_of(self.buttons.iter().map(|b| &b.element_id), id)
            .map(ButtonSlot::Grid)
            .or_else(|| {
                position_of(self.leading_buttons.iter().map(|b| &b.element_id), id)
                    .map(ButtonSlot::Leading)
            })
            .or_else(|| {
                position_of(self.trailing_buttons.iter().map(|b| &b.element_id), id)
                    .map(ButtonSlot::Trailing)
            })
            .map(Node::Button)
    }

    pub(crate) fn bar_button(&self, slot: ButtonSlot) -> Option<&BarButton> {
        match slot {
            ButtonSlot::Leading(i) => self.leading_buttons.get(i),
            ButtonSlot::Trailing(i) => self.trailing_buttons.get(i),
            _ => None,
        }
    }

    pub(crate) fn collect_images(&self, out: &mut Vec<(ElementId, ImageRef)>) {
        for button in &self.buttons {
            collect_unresolved(out, &button.element_id, button.image.as_ref());
        }
        for button in self.leading_buttons.iter().chain(&self.trailing_buttons) {
            button.collect_images(out);
        }
    }

    pub fn to_native(&self) -> NativeGrid {
        NativeGrid {
            element_id: self.element_id.clone(),
            title: self.title.clone(),
            buttons: self.buttons.iter().map(GridButton::to_native).collect(),
            leading_buttons: self.leading_buttons.iter().map(BarButton::to_native).collect(),
            trailing_buttons: self.trailing_buttons.iter().map(BarButton::to_native).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid(buttons: usize) -> GridTemplate {
        let buttons: Vec<_> = (0..buttons)
            .map(|i| json!({"elementId": format!("g{i}"), "titles": [format!("Tile {i}")]}))
            .collect();
        serde_json::from_value(json!({"elementId": "grid", "buttons": buttons})).unwrap()
    }

    #[test]
    fn test_grid_is_capped_at_host_limit() {
        let mut template = grid(10);
        assert!(template.enforce_limits(&Limits::default()));
        assert_eq!(template.buttons.len(), 8);
        assert_eq!(template.buttons[7].element_id.as_str(), "g7");
    }

    #[test]
    fn test_locate_grid_button() {
        let template = grid(3);
        assert_eq!(
            template.locate(&"g2".into()),
            Some(Node::Button(ButtonSlot::Grid(2)))
        );
    }

    #[test]
    fn test_title_update_changes_native() {
        let mut template = grid(1);
        let delta: GridDelta = serde_json::from_value(json!({"title": "Apps"})).unwrap();
        assert!(template.apply(delta));
        assert_eq!(template.to_native().title.as_deref(), Some("Apps"));
    }
}
