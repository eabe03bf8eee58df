//! Bar buttons and text actions.

use serde::{Deserialize, Serialize};

use crate::element::{ElementId, ImageRef, ImageSlot, collect_unresolved};
use crate::model::native::{ButtonLabel, NativeButton};
use crate::payload::default_true;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonStyle {
    #[default]
    Normal,
    Cancel,
    Destructive,
    Confirm,
}

/// A navigation bar button. Shows its title when it has one, otherwise its
/// image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarButton {
    pub element_id: ElementId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<ImageSlot>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub style: ButtonStyle,
}

impl BarButton {
    pub fn to_native(&self) -> NativeButton {
        let label = match (&self.title, &self.image) {
            (Some(title), _) => ButtonLabel::Title(title.clone()),
            (None, Some(image)) => ButtonLabel::Image(image.resolved()),
            (None, None) => ButtonLabel::Empty,
        };
        NativeButton {
            element_id: self.element_id.clone(),
            label,
            enabled: self.enabled,
            style: self.style,
        }
    }

    pub(crate) fn collect_images(&self, out: &mut Vec<(ElementId, ImageRef)>) {
        collect_unresolved(out, &self.element_id, self.image.as_ref());
    }
}

/// A text-only action: alert and action sheet actions, information template
/// footer buttons.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextButton {
    pub element_id: ElementId,
    pub title: String,
    #[serde(default)]
    pub style: ButtonStyle,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl TextButton {
    pub fn to_native(&self) -> NativeButton {
        NativeButton {
            element_id: self.element_id.clone(),
            label: ButtonLabel::Title(self.title.clone()),
            enabled: self.enabled,
            style: self.style,
        }
    }
}

/// Index of `id` within `buttons`.
pub(crate) fn position_of<'a, I>(buttons: I, id: &ElementId) -> Option<usize>
where
    I: IntoIterator<Item = &'a ElementId>,
{
    buttons.into_iter().position(|candidate| candidate == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_title_wins_over_image() {
        let button: BarButton = serde_json::from_value(json!({
            "elementId": "b1",
            "title": "Edit",
            "image": "asset://pencil"
        }))
        .unwrap();
        assert_eq!(button.to_native().label, ButtonLabel::Title("Edit".into()));
        assert!(button.enabled);
        assert_eq!(button.style, ButtonStyle::Normal);
    }

    #[test]
    fn test_image_button_waits_for_resolution() {
        let button: BarButton = serde_json::from_value(json!({
            "elementId": "b2",
            "image": "asset://gear",
            "style": "destructive"
        }))
        .unwrap();
        assert_eq!(button.to_native().label, ButtonLabel::Image(None));
        assert_eq!(button.style, ButtonStyle::Destructive);

        let mut images = Vec::new();
        button.collect_images(&mut images);
        assert_eq!(images, vec![(ElementId::new("b2"), ImageRef::new("asset://gear"))]);
    }
}
