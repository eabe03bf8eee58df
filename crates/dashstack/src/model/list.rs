//! List templates, their sections and rows.

use serde::{Deserialize, Serialize};

use crate::config::Limits;
use crate::element::{ElementId, ImageRef, ImageSlot, collect_unresolved};
use crate::model::button::{BarButton, position_of};
use crate::model::native::{ListLayout, NativeList, NativeRow, NativeSection};
use crate::model::{ButtonSlot, Node};
use crate::payload::{assign, default_true, double_option, truncate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Accessory {
    DisclosureIndicator,
    Checkmark,
    Cloud,
}

/// Where a row is in its selection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    /// Selected and reported; further selections are swallowed until the
    /// remote driver acknowledges.
    Pending,
}

/// A list row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub element_id: ElementId,
    pub text: String,
    #[serde(default)]
    pub detail_text: Option<String>,
    #[serde(default)]
    pub image: Option<ImageSlot>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub accessory: Option<Accessory>,
    /// Whether selecting the row reports an event at all.
    #[serde(default = "default_true")]
    pub interactable: bool,
    #[serde(skip)]
    selection: SelectionState,
}

/// Partial update for a [`ListItem`]. Absent keys are left alone; an explicit
/// `null` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDelta {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub detail_text: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image: Option<Option<ImageRef>>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub accessory: Option<Option<Accessory>>,
    #[serde(default)]
    pub interactable: Option<bool>,
}

impl ItemDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl ListItem {
    pub fn new(element_id: impl Into<ElementId>, text: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            text: text.into(),
            detail_text: None,
            image: None,
            enabled: true,
            accessory: None,
            interactable: true,
            selection: SelectionState::Idle,
        }
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    /// Enter the pending state. Returns `true` only when this selection
    /// should be reported.
    pub fn begin_selection(&mut self) -> bool {
        if !self.enabled || !self.interactable || self.selection == SelectionState::Pending {
            return false;
        }
        self.selection = SelectionState::Pending;
        true
    }

    /// Release a pending selection. Returns `false` if none was pending.
    pub fn acknowledge_selection(&mut self) -> bool {
        std::mem::replace(&mut self.selection, SelectionState::Idle) == SelectionState::Pending
    }

    /// Apply a delta in place, returning whether anything visible changed.
    pub fn apply(&mut self, delta: ItemDelta) -> bool {
        let mut changed = assign(&mut self.text, delta.text);
        changed |= assign(&mut self.detail_text, delta.detail_text);
        changed |= assign(&mut self.enabled, delta.enabled);
        changed |= assign(&mut self.accessory, delta.accessory);
        changed |= assign(&mut self.interactable, delta.interactable);

        if let Some(image) = delta.image {
            let current = self.image.as_ref().map(ImageSlot::reference);
            if current != image.as_ref() {
                self.image = image.map(ImageSlot::new);
                changed = true;
            }
        }
        changed
    }

    pub fn to_native(&self) -> NativeRow {
        NativeRow {
            element_id: self.element_id.clone(),
            text: self.text.clone(),
            detail_text: self.detail_text.clone(),
            image: self.image.as_ref().and_then(ImageSlot::resolved),
            enabled: self.enabled,
            accessory: self.accessory,
            loading: self.selection == SelectionState::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub element_id: ElementId,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub items: Vec<ListItem>,
}

impl Section {
    pub fn has_header(&self) -> bool {
        self.header.as_deref().is_some_and(|h| !h.is_empty())
    }

    fn to_native(&self) -> NativeSection {
        NativeSection {
            element_id: self.element_id.clone(),
            header: self.header.clone().filter(|h| !h.is_empty()),
            rows: self.items.iter().map(ListItem::to_native).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTemplate {
    pub element_id: ElementId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub leading_buttons: Vec<BarButton>,
    #[serde(default)]
    pub trailing_buttons: Vec<BarButton>,
    #[serde(default)]
    pub back_button: Option<BarButton>,
    #[serde(default)]
    pub empty_view_title: Option<String>,
    #[serde(default)]
    pub searchable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDelta {
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default)]
    pub sections: Option<Vec<Section>>,
    #[serde(default)]
    pub leading_buttons: Option<Vec<BarButton>>,
    #[serde(default)]
    pub trailing_buttons: Option<Vec<BarButton>>,
    #[serde(default, deserialize_with = "double_option")]
    pub back_button: Option<Option<BarButton>>,
    #[serde(default, deserialize_with = "double_option")]
    pub empty_view_title: Option<Option<String>>,
    #[serde(default)]
    pub searchable: Option<bool>,
}

impl ListTemplate {
    pub(crate) fn apply(&mut self, delta: ListDelta) -> bool {
        let mut changed = assign(&mut self.title, delta.title);
        changed |= assign(&mut self.sections, delta.sections);
        changed |= assign(&mut self.leading_buttons, delta.leading_buttons);
        changed |= assign(&mut self.trailing_buttons, delta.trailing_buttons);
        changed |= assign(&mut self.back_button, delta.back_button);
        changed |= assign(&mut self.empty_view_title, delta.empty_view_title);
        changed |= assign(&mut self.searchable, delta.searchable);
        changed
    }

    /// Truncate sections, rows and bar buttons to the host limits.
    pub(crate) fn enforce_limits(&mut self, limits: &Limits) -> bool {
        let mut truncated = truncate(&mut self.sections, limits.max_sections, "sections", &self.element_id);

        let mut remaining = limits.max_list_items;
        for section in &mut self.sections {
            truncated |= truncate(&mut section.items, remaining, "items", &self.element_id);
            remaining -= section.items.len();
        }

        truncated |= truncate(&mut self.leading_buttons, limits.max_bar_buttons, "leading buttons", &self.element_id);
        truncated |= truncate(&mut self.trailing_buttons, limits.max_bar_buttons, "trailing buttons", &self.element_id);
        truncated
    }

    pub(crate) fn locate(&self, id: &ElementId) -> Option<Node> {
        for (s, section) in self.sections.iter().enumerate() {
            if &section.element_id == id {
                return Some(Node::Section { section: s });
            }
            if let Some(row) = section.items.iter().position(|item| &item.element_id == id) {
                return Some(Node::Item { section: s, row });
            }
        }
        if let Some(i) = position_of(self.leading_buttons.iter().map(|b| &b.element_id), id) {
            return Some(Node::Button(ButtonSlot::Leading(i)));
        }
        if let Some(i) = position_of(self.trailing_buttons.iter().map(|b| &b.element_id), id) {
            return Some(Node::Button(ButtonSlot::Trailing(i)));
        }
        match &self.back_button {
            Some(back) if &back.element_id == id => Some(Node::Button(ButtonSlot::Back)),
            _ => None,
        }
    }

    pub fn item(&self, section: usize, row: usize) -> Option<&ListItem> {
        self.sections.get(section)?.items.get(row)
    }

    pub fn item_mut(&mut self, section: usize, row: usize) -> Option<&mut ListItem> {
        self.sections.get_mut(section)?.items.get_mut(row)
    }

    pub(crate) fn button(&self, slot: ButtonSlot) -> Option<&BarButton> {
        match slot {
            ButtonSlot::Leading(i) => self.leading_buttons.get(i),
            ButtonSlot::Trailing(i) => self.trailing_buttons.get(i),
            ButtonSlot::Back => self.back_button.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn button_mut(&mut self, slot: ButtonSlot) -> Option<&mut BarButton> {
        match slot {
            ButtonSlot::Leading(i) => self.leading_buttons.get_mut(i),
            ButtonSlot::Trailing(i) => self.trailing_buttons.get_mut(i),
            ButtonSlot::Back => self.back_button.as_mut(),
            _ => None,
        }
    }

    pub(crate) fn collect_images(&self, out: &mut Vec<(ElementId, ImageRef)>) {
        for item in self.sections.iter().flat_map(|s| &s.items) {
            collect_unresolved(out, &item.element_id, item.image.as_ref());
        }
        for button in self.leading_buttons.iter().chain(&self.trailing_buttons).chain(&self.back_button) {
            button.collect_images(out);
        }
    }

    /// Zero sections render as loading; a single header-less section renders
    /// flat; anything else renders sectioned.
    pub fn layout(&self) -> ListLayout {
        match self.sections.as_slice() {
            [] => ListLayout::Loading,
            [only] if !only.has_header() => {
                ListLayout::Flat(only.items.iter().map(ListItem::to_native).collect())
            }
            sections => ListLayout::Sectioned(sections.iter().map(Section::to_native).collect()),
        }
    }

    pub fn to_native(&self) -> NativeList {
        NativeList {
            element_id: self.element_id.clone(),
            title: self.title.clone(),
            layout: self.layout(),
            leading_buttons: self.leading_buttons.iter().map(BarButton::to_native).collect(),
            trailing_buttons: self.trailing_buttons.iter().map(BarButton::to_native).collect(),
            back_button: self.back_button.as_ref().map(BarButton::to_native),
            empty_view_title: self.empty_view_title.clone(),
            searchable: self.searchable,
        }
    }
}
