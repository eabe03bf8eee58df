//! The template object model.
//!
//! Templates are constructed from decoded remote payloads, mutated in place by
//! partial deltas, and rendered to a [`NativeTemplate`] for the host. Every
//! addressable element inside a template is reachable through
//! [`Template::locate`], which returns a [`Node`] path rather than a pointer so
//! callers re-resolve after every structural change.

pub mod button;
pub mod grid;
pub mod information;
pub mod list;
pub mod map;
pub mod modal;
pub mod native;

use std::fmt;

use serde_json::Value;

use crate::config::Limits;
use crate::element::{ElementId, ImageHandle, ImageRef, ImageSlot};
use crate::error::{BridgeError, Result};

pub use button::{BarButton, ButtonStyle, TextButton};
pub use grid::{GridButton, GridDelta, GridTemplate};
pub use information::{InfoItem, InfoLayout, InformationDelta, InformationTemplate};
pub use list::{Accessory, ItemDelta, ListDelta, ListItem, ListTemplate, Section, SelectionState};
pub use map::{MapButton, MapDelta, MapTemplate, RouteChoice, Trip};
pub use modal::{
    ActionSheetDelta, ActionSheetTemplate, AlertDelta, AlertTemplate, VoiceControlDelta,
    VoiceControlTemplate, VoiceState,
};
pub use native::NativeTemplate;

/// The kinds of template the bridge can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    List,
    Grid,
    Information,
    Map,
    Alert,
    ActionSheet,
    VoiceControl,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 7] = [
        Self::List,
        Self::Grid,
        Self::Information,
        Self::Map,
        Self::Alert,
        Self::ActionSheet,
        Self::VoiceControl,
    ];

    /// The `runtimeType` discriminant used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::List => "ListTemplate",
            Self::Grid => "GridTemplate",
            Self::Information => "InformationTemplate",
            Self::Map => "MapTemplate",
            Self::Alert => "AlertTemplate",
            Self::ActionSheet => "ActionSheetTemplate",
            Self::VoiceControl => "VoiceControlTemplate",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }

    /// May sit at the bottom of the navigation stack.
    pub fn is_root_capable(self) -> bool {
        matches!(self, Self::List | Self::Grid | Self::Information | Self::Map)
    }

    /// May be pushed above the root.
    pub fn is_pushable(self) -> bool {
        self.is_root_capable() || self == Self::VoiceControl
    }

    /// May occupy the modal slot.
    pub fn is_presentable(self) -> bool {
        matches!(self, Self::Alert | Self::ActionSheet | Self::VoiceControl)
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Which button inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonSlot {
    Leading(usize),
    Trailing(usize),
    Back,
    Grid(usize),
    Map(usize),
    /// Alert, action sheet or information footer action.
    Action(usize),
}

/// Position of an element inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Template,
    Section { section: usize },
    Item { section: usize, row: usize },
    Button(ButtonSlot),
    Trip { trip: usize },
    RouteChoice { trip: usize, choice: usize },
}

/// A live template of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    List(ListTemplate),
    Grid(GridTemplate),
    Information(InformationTemplate),
    Map(MapTemplate),
    Alert(AlertTemplate),
    ActionSheet(ActionSheetTemplate),
    VoiceControl(VoiceControlTemplate),
}

/// A kind-specific partial update.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateDelta {
    List(ListDelta),
    Grid(GridDelta),
    Information(InformationDelta),
    Map(MapDelta),
    Alert(AlertDelta),
    ActionSheet(ActionSheetDelta),
    VoiceControl(VoiceControlDelta),
}

impl TemplateDelta {
    pub(crate) fn from_value(kind: TemplateKind, value: Value) -> Result<Self> {
        Ok(match kind {
            TemplateKind::List => Self::List(serde_json::from_value(value)?),
            TemplateKind::Grid => Self::Grid(serde_json::from_value(value)?),
            TemplateKind::Information => Self::Information(serde_json::from_value(value)?),
            TemplateKind::Map => Self::Map(serde_json::from_value(value)?),
            TemplateKind::Alert => Self::Alert(serde_json::from_value(value)?),
            TemplateKind::ActionSheet => Self::ActionSheet(serde_json::from_value(value)?),
            TemplateKind::VoiceControl => Self::VoiceControl(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::List(_) => TemplateKind::List,
            Self::Grid(_) => TemplateKind::Grid,
            Self::Information(_) => TemplateKind::Information,
            Self::Map(_) => TemplateKind::Map,
            Self::Alert(_) => TemplateKind::Alert,
            Self::ActionSheet(_) => TemplateKind::ActionSheet,
            Self::VoiceControl(_) => TemplateKind::VoiceControl,
        }
    }
}

impl Template {
    pub(crate) fn from_value(kind: TemplateKind, value: Value) -> Result<Self> {
        Ok(match kind {
            TemplateKind::List => Self::List(serde_json::from_value(value)?),
            TemplateKind::Grid => Self::Grid(serde_json::from_value(value)?),
            TemplateKind::Information => Self::Information(serde_json::from_value(value)?),
            TemplateKind::Map => Self::Map(serde_json::from_value(value)?),
            TemplateKind::Alert => Self::Alert(serde_json::from_value(value)?),
            TemplateKind::ActionSheet => Self::ActionSheet(serde_json::from_value(value)?),
            TemplateKind::VoiceControl => Self::VoiceControl(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::List(_) => TemplateKind::List,
            Self::Grid(_) => TemplateKind::Grid,
            Self::Information(_) => TemplateKind::Information,
            Self::Map(_) => TemplateKind::Map,
            Self::Alert(_) => TemplateKind::Alert,
            Self::ActionSheet(_) => TemplateKind::ActionSheet,
            Self::VoiceControl(_) => TemplateKind::VoiceControl,
        }
    }

    pub fn element_id(&self) -> &ElementId {
        match self {
            Self::List(t) => &t.element_id,
            Self::Grid(t) => &t.element_id,
            Self::Information(t) => &t.element_id,
            Self::Map(t) => &t.element_id,
            Self::Alert(t) => &t.element_id,
            Self::ActionSheet(t) => &t.element_id,
            Self::VoiceControl(t) => &t.element_id,
        }
    }

    pub fn as_list(&self) -> Option<&ListTemplate> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// Find `id` in this template: the template itself first, then its
    /// sections and items, then its buttons.
    pub fn locate(&self, id: &ElementId) -> Option<Node> {
        if self.element_id() == id {
            return Some(Node::Template);
        }
        match self {
            Self::List(t) => t.locate(id),
            Self::Grid(t) => t.locate(id),
            Self::Information(t) => t.locate(id),
            Self::Map(t) => t.locate(id),
            Self::Alert(t) => t.locate(id),
            Self::ActionSheet(t) => t.locate(id),
            Self::VoiceControl(_) => None,
        }
    }

    /// Every element id this template owns, its own first.
    pub fn element_ids(&self) -> Vec<&ElementId> {
        let mut ids = vec![self.element_id()];
        match self {
            Self::List(t) => {
                for section in &t.sections {
                    ids.push(&section.element_id);
                    ids.extend(section.items.iter().map(|item| &item.element_id));
                }
                ids.extend(t.leading_buttons.iter().map(|b| &b.element_id));
                ids.extend(t.trailing_buttons.iter().map(|b| &b.element_id));
                ids.extend(t.back_button.iter().map(|b| &b.element_id));
            }
            Self::Grid(t) => {
                ids.extend(t.buttons.iter().map(|b| &b.element_id));
                ids.extend(t.leading_buttons.iter().map(|b| &b.element_id));
                ids.extend(t.trailing_buttons.iter().map(|b| &b.element_id));
            }
            Self::Information(t) => ids.extend(t.actions.iter().map(|a| &a.element_id)),
            Self::Map(t) => {
                ids.extend(t.map_buttons.iter().map(|b| &b.element_id));
                ids.extend(t.leading_buttons.iter().map(|b| &b.element_id));
                ids.extend(t.trailing_buttons.iter().map(|b| &b.element_id));
                for trip in &t.trips {
                    ids.push(&trip.element_id);
                    ids.extend(trip.route_choices.iter().map(|c| &c.element_id));
                }
            }
            Self::Alert(t) => ids.extend(t.actions.iter().map(|a| &a.element_id)),
            Self::ActionSheet(t) => ids.extend(t.actions.iter().map(|a| &a.element_id)),
            Self::VoiceControl(_) => {}
        }
        ids
    }

    /// Truncate content to the host limits. Returns whether anything was cut.
    pub fn enforce_limits(&mut self, limits: &Limits) -> bool {
        match self {
            Self::List(t) => t.enforce_limits(limits),
            Self::Grid(t) => t.enforce_limits(limits),
            Self::Information(t) => t.enforce_limits(),
            Self::Map(t) => t.enforce_limits(limits),
            Self::Alert(_) | Self::ActionSheet(_) | Self::VoiceControl(_) => false,
        }
    }

    /// Apply a partial update in place, then re-apply the host limits.
    ///
    /// Returns whether anything visible changed, so the caller knows whether
    /// the host needs to redraw.
    pub fn apply_delta(&mut self, delta: TemplateDelta, limits: &Limits) -> Result<bool> {
        let changed = match (&mut *self, delta) {
            (Self::List(t), TemplateDelta::List(d)) => t.apply(d),
            (Self::Grid(t), TemplateDelta::Grid(d)) => t.apply(d),
            (Self::Information(t), TemplateDelta::Information(d)) => t.apply(d),
            (Self::Map(t), TemplateDelta::Map(d)) => t.apply(d),
            (Self::Alert(t), TemplateDelta::Alert(d)) => t.apply(d),
            (Self::ActionSheet(t), TemplateDelta::ActionSheet(d)) => t.apply(d),
            (Self::VoiceControl(t), TemplateDelta::VoiceControl(d)) => t.apply(d)?,
            (template, delta) => {
                return Err(BridgeError::bad_arguments(format!(
                    "{} delta cannot update a {}",
                    delta.kind(),
                    template.kind()
                )));
            }
        };
        if changed {
            // Replaced collections may exceed the limits again.
            self.enforce_limits(limits);
        }
        Ok(changed)
    }

    pub fn item(&self, section: usize, row: usize) -> Option<&ListItem> {
        match self {
            Self::List(t) => t.item(section, row),
            _ => None,
        }
    }

    pub fn item_mut(&mut self, section: usize, row: usize) -> Option<&mut ListItem> {
        match self {
            Self::List(t) => t.item_mut(section, row),
            _ => None,
        }
    }

    /// Whether the button at `slot` exists and is enabled.
    pub fn button_enabled(&self, slot: ButtonSlot) -> Option<bool> {
        match (self, slot) {
            (Self::List(t), slot) => t.button(slot).map(|b| b.enabled),
            (Self::Grid(t), ButtonSlot::Grid(i)) => t.buttons.get(i).map(|b| b.enabled),
            (Self::Grid(t), slot) => t.bar_button(slot).map(|b| b.enabled),
            (Self::Map(t), ButtonSlot::Map(i)) => t.map_buttons.get(i).map(|b| b.enabled && !b.hidden),
            (Self::Map(t), slot) => t.bar_button(slot).map(|b| b.enabled),
            (Self::Information(t), ButtonSlot::Action(i)) => t.actions.get(i).map(|a| a.enabled),
            (Self::Alert(t), ButtonSlot::Action(i)) => t.actions.get(i).map(|a| a.enabled),
            (Self::ActionSheet(t), ButtonSlot::Action(i)) => t.actions.get(i).map(|a| a.enabled),
            _ => None,
        }
    }

    /// The image slot owned by element `id`, if it has one.
    pub fn image_slot_mut(&mut self, id: &ElementId) -> Option<&mut ImageSlot> {
        let node = self.locate(id)?;
        match (self, node) {
            (Self::List(t), Node::Item { section, row }) => t.item_mut(section, row)?.image.as_mut(),
            (Self::List(t), Node::Button(slot)) => t.button_mut(slot)?.image.as_mut(),
            (Self::Grid(t), Node::Button(ButtonSlot::Grid(i))) => t.buttons.get_mut(i)?.image.as_mut(),
            (Self::Grid(t), Node::Button(ButtonSlot::Leading(i))) => {
                t.leading_buttons.get_mut(i)?.image.as_mut()
            }
            (Self::Grid(t), Node::Button(ButtonSlot::Trailing(i))) => {
                t.trailing_buttons.get_mut(i)?.image.as_mut()
            }
            (Self::Map(t), Node::Button(ButtonSlot::Map(i))) => t.map_buttons.get_mut(i)?.image.as_mut(),
            (Self::Map(t), Node::Button(ButtonSlot::Leading(i))) => {
                t.leading_buttons.get_mut(i)?.image.as_mut()
            }
            (Self::Map(t), Node::Button(ButtonSlot::Trailing(i))) => {
                t.trailing_buttons.get_mut(i)?.image.as_mut()
            }
            _ => None,
        }
    }

    /// Store a resolved image on element `id`. Returns `false` if the element
    /// is gone or now points at a different reference.
    pub fn apply_image(&mut self, id: &ElementId, reference: &ImageRef, handle: ImageHandle) -> bool {
        self.image_slot_mut(id)
            .is_some_and(|slot| slot.resolve(reference, handle))
    }

    /// Every `(owner, reference)` pair still waiting for an image.
    pub fn unresolved_images(&self) -> Vec<(ElementId, ImageRef)> {
        let mut out = Vec::new();
        match self {
            Self::List(t) => t.collect_images(&mut out),
            Self::Grid(t) => t.collect_images(&mut out),
            Self::Map(t) => t.collect_images(&mut out),
            Self::Information(_) | Self::Alert(_) | Self::ActionSheet(_) | Self::VoiceControl(_) => {}
        }
        out
    }

    pub fn is_searchable(&self) -> bool {
        matches!(self, Self::List(t) if t.searchable)
    }

    pub fn to_native(&self) -> NativeTemplate {
        match self {
            Self::List(t) => NativeTemplate::List(t.to_native()),
            Self::Grid(t) => NativeTemplate::Grid(t.to_native()),
            Self::Information(t) => NativeTemplate::Information(t.to_native()),
            Self::Map(t) => NativeTemplate::Map(t.to_native()),
            Self::Alert(t) => NativeTemplate::Alert(t.to_native()),
            Self::ActionSheet(t) => NativeTemplate::ActionSheet(t.to_native()),
            Self::VoiceControl(t) => NativeTemplate::VoiceControl(t.to_native()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{decode_template, decode_template_delta};
    use serde_json::json;

    #[test]
    fn test_capability_sets() {
        assert!(TemplateKind::List.is_root_capable());
        assert!(!TemplateKind::VoiceControl.is_root_capable());
        assert!(TemplateKind::VoiceControl.is_pushable());
        assert!(TemplateKind::VoiceControl.is_presentable());
        assert!(!TemplateKind::Alert.is_pushable());
        assert!(!TemplateKind::Map.is_presentable());
    }

    #[test]
    fn test_wire_names_round_trip() {
        for kind in TemplateKind::ALL {
            assert_eq!(TemplateKind::from_wire(kind.wire_name()), Some(kind));
        }
        assert_eq!(TemplateKind::from_wire("listTemplate"), None);
    }

    #[test]
    fn test_delta_kind_mismatch_is_rejected() {
        let mut template = decode_template(
            "GridTemplate",
            json!({"elementId": "grid"}),
            &Limits::default(),
        )
        .unwrap();
        let delta = decode_template_delta(TemplateKind::List, json!({"title": "x"})).unwrap();

        let err = template.apply_delta(delta, &Limits::default()).unwrap_err();
        assert_eq!(err.code(), "bad_arguments");
    }

    #[test]
    fn test_section_replacement_is_capped() {
        let limits = Limits {
            max_list_items: 2,
            ..Limits::default()
        };
        let mut template =
            decode_template("ListTemplate", json!({"elementId": "l"}), &limits).unwrap();
        let delta = decode_template_delta(
            TemplateKind::List,
            json!({"sections": [{"elementId": "s", "items": [
                {"elementId": "a", "text": "A"},
                {"elementId": "b", "text": "B"},
                {"elementId": "c", "text": "C"}
            ]}]}),
        )
        .unwrap();

        assert!(template.apply_delta(delta, &limits).unwrap());
        let list = template.as_list().unwrap();
        assert_eq!(list.sections[0].items.len(), 2);
    }

    #[test]
    fn test_element_ids_cover_nested_nodes() {
        let template = decode_template(
            "ListTemplate",
            json!({
                "elementId": "l",
                "sections": [{"elementId": "s", "items": [{"elementId": "i", "text": "x"}]}],
                "trailingButtons": [{"elementId": "t", "title": "More"}],
                "backButton": {"elementId": "back", "title": "Back"}
            }),
            &Limits::default(),
        )
        .unwrap();

        let ids: Vec<&str> = template.element_ids().into_iter().map(ElementId::as_str).collect();
        assert_eq!(ids, vec!["l", "s", "i", "t", "back"]);
    }

    #[test]
    fn test_late_image_for_replaced_reference_is_ignored() {
        let mut template = decode_template(
            "ListTemplate",
            json!({"elementId": "l", "sections": [{"elementId": "s", "items": [
                {"elementId": "a", "text": "A", "image": "https://cdn/a.png"}
            ]}]}),
            &Limits::default(),
        )
        .unwrap();
        let id = ElementId::new("a");

        let item = template.item_mut(0, 0).unwrap();
        let delta: ItemDelta = serde_json::from_value(json!({"image": "https://cdn/b.png"})).unwrap();
        assert!(item.apply(delta));

        assert!(!template.apply_image(&id, &ImageRef::new("https://cdn/a.png"), ImageHandle(1)));
        assert!(template.apply_image(&id, &ImageRef::new("https://cdn/b.png"), ImageHandle(2)));
        assert!(template.unresolved_images().is_empty());
    }
}
