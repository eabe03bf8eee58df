//! Host-native template descriptions.
//!
//! This is what a [`HostSurface`](crate::host::HostSurface) turns into an
//! actual screen. It is a flattened, render-ready snapshot: resolved images,
//! the list layout decision, and per-row selection state are baked in.

use serde::Serialize;

use crate::element::{ElementId, ImageHandle};
use crate::model::button::ButtonStyle;
use crate::model::information::InfoLayout;
use crate::model::list::Accessory;

/// Render-ready snapshot of a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NativeTemplate {
    List(NativeList),
    Grid(NativeGrid),
    Information(NativeInformation),
    Map(NativeMap),
    Alert(NativeAlert),
    ActionSheet(NativeActionSheet),
    VoiceControl(NativeVoiceControl),
}

impl NativeTemplate {
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

    /// The list snapshot, if this is a list.
    pub fn as_list(&self) -> Option<&NativeList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }
}

/// How a list is laid out on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layout", content = "content", rename_all = "camelCase")]
pub enum ListLayout {
    /// No sections yet; the host shows a spinner.
    Loading,
    /// A single header-less section, shown without section chrome.
    Flat(Vec<NativeRow>),
    Sectioned(Vec<NativeSection>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeList {
    pub element_id: ElementId,
    pub title: Option<String>,
    pub layout: ListLayout,
    pub leading_buttons: Vec<NativeButton>,
    pub trailing_buttons: Vec<NativeButton>,
    pub back_button: Option<NativeButton>,
    pub empty_view_title: Option<String>,
    pub searchable: bool,
}

impl NativeList {
    pub fn is_loading(&self) -> bool {
        matches!(self.layout, ListLayout::Loading)
    }

    pub fn is_sectioned(&self) -> bool {
        matches!(self.layout, ListLayout::Sectioned(_))
    }

    /// Every row, in display order, regardless of layout.
    pub fn rows(&self) -> Vec<&NativeRow> {
        match &self.layout {
            ListLayout::Loading => Vec::new(),
            ListLayout::Flat(rows) => rows.iter().collect(),
            ListLayout::Sectioned(sections) => sections.iter().flat_map(|s| &s.rows).collect(),
        }
    }

    pub fn sections(&self) -> &[NativeSection] {
        match &self.layout {
            ListLayout::Sectioned(sections) => sections,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeSection {
    pub element_id: ElementId,
    pub header: Option<String>,
    pub rows: Vec<NativeRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeRow {
    pub element_id: ElementId,
    pub text: String,
    pub detail_text: Option<String>,
    pub image: Option<ImageHandle>,
    pub enabled: bool,
    pub accessory: Option<Accessory>,
    /// The row is waiting for the remote driver to acknowledge a selection.
    pub loading: bool,
}

/// What a button shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonLabel {
    Title(String),
    /// An image button; `None` until the image resolves.
    Image(Option<ImageHandle>),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeButton {
    pub element_id: ElementId,
    pub label: ButtonLabel,
    pub enabled: bool,
    pub style: ButtonStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeGrid {
    pub element_id: ElementId,
    pub title: Option<String>,
    pub buttons: Vec<NativeGridButton>,
    pub leading_buttons: Vec<NativeButton>,
    pub trailing_buttons: Vec<NativeButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeGridButton {
    pub element_id: ElementId,
    pub titles: Vec<String>,
    pub image: Option<ImageHandle>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeInformation {
    pub element_id: ElementId,
    pub title: String,
    pub layout: InfoLayout,
    pub items: Vec<(Option<String>, Option<String>)>,
    pub actions: Vec<NativeButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeMap {
    pub element_id: ElementId,
    pub map_buttons: Vec<NativeMapButton>,
    pub leading_buttons: Vec<NativeButton>,
    pub trailing_buttons: Vec<NativeButton>,
    pub trips: Vec<NativeTrip>,
    pub automatically_hides_navigation_bar: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeMapButton {
    pub element_id: ElementId,
    pub image: Option<ImageHandle>,
    pub enabled: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTrip {
    pub element_id: ElementId,
    pub origin: String,
    pub destination: String,
    pub route_choices: Vec<ElementId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAlert {
    pub element_id: ElementId,
    pub title_variants: Vec<String>,
    pub actions: Vec<NativeButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeActionSheet {
    pub element_id: ElementId,
    pub title: Option<String>,
    pub message: Option<String>,
    pub actions: Vec<NativeButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeVoiceControl {
    pub element_id: ElementId,
    /// Titles of the active voice state, empty when none is active.
    pub active_titles: Vec<String>,
    pub active_state: Option<String>,
    pub repeats: bool,
}
