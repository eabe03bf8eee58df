//! Map templates, map buttons and trip previews.

use serde::Deserialize;

use crate::config::Limits;
use crate::element::{ElementId, ImageRef, ImageSlot, collect_unresolved};
use crate::model::button::{BarButton, position_of};
use crate::model::native::{NativeMap, NativeMapButton, NativeTrip};
use crate::model::{ButtonSlot, Node};
use crate::payload::{assign, default_true, truncate};

/// A floating button over the map surface.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapButton {
    pub element_id: ElementId,
    #[serde(default)]
    pub image: Option<ImageSlot>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// One way to get from a trip's origin to its destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteChoice {
    pub element_id: ElementId,
    #[serde(default)]
    pub summary_variants: Vec<String>,
    #[serde(default)]
    pub additional_information: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub element_id: ElementId,
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub route_choices: Vec<RouteChoice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapTemplate {
    pub element_id: ElementId,
    #[serde(default)]
    pub map_buttons: Vec<MapButton>,
    #[serde(default)]
    pub leading_buttons: Vec<BarButton>,
    #[serde(default)]
    pub trailing_buttons: Vec<BarButton>,
    #[serde(default)]
    pub trips: Vec<Trip>,
    #[serde(default)]
    pub automatically_hides_navigation_bar: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDelta {
    #[serde(default)]
    pub map_buttons: Option<Vec<MapButton>>,
    #[serde(default)]
    pub leading_buttons: Option<Vec<BarButton>>,
    #[serde(default)]
    pub trailing_buttons: Option<Vec<BarButton>>,
    #[serde(default)]
    pub trips: Option<Vec<Trip>>,
    #[serde(default)]
    pub automatically_hides_navigation_bar: Option<bool>,
}

impl MapTemplate {
    pub(crate) fn apply(&mut self, delta: MapDelta) -> bool {
        let mut changed = assign(&mut self.map_buttons, delta.map_buttons);
        changed |= assign(&mut self.leading_buttons, delta.leading_buttons);
        changed |= assign(&mut self.trailing_buttons, delta.trailing_buttons);
        changed |= assign(&mut self.trips, delta.trips);
        changed |= assign(
            &mut self.automatically_hides_navigation_bar,
            delta.automatically_hides_navigation_bar,
        );
        changed
    }

    pub(crate) fn enforce_limits(&mut self, limits: &Limits) -> bool {
        let id = &self.element_id;
        truncate(&mut self.map_buttons, limits.max_map_buttons, "map buttons", id)
            | truncate(&mut self.leading_buttons, limits.max_bar_buttons, "leading buttons", id)
            | truncate(&mut self.trailing_buttons, limits.max_bar_buttons, "trailing buttons", id)
    }

    pub(crate) fn locate(&self, id: &ElementId) -> Option<Node> {
        if let Some(i) = position_of(self.map_buttons.iter().map(|b| &b.element_id), id) {
            return Some(Node::Button(ButtonSlot::Map(i)));
        }
        if let Some(i) = position_of(self.leading_buttons.iter().map(|b| &b.element_id), id) {
            return Some(Node::Button(ButtonSlot::Leading(i)));
        }
        if let Some(i) = position_of(self.trailing_buttons.iter().map(|b| &b.element_id), id) {
            return Some(Node::Button(ButtonSlot::Trailing(i)));
        }
        for (t, trip) in self.trips.iter().enumerate() {
            if &trip.element_id == id {
                return Some(Node::Trip { trip: t });
            }
            if let Some(choice) = position_of(trip.route_choices.iter().map(|c| &c.element_id), id) {
                return Some(Node::RouteChoice { trip: t, choice });
            }
        }
        None
    }

    pub(crate) fn bar_button(&self, slot: ButtonSlot) -> Option<&BarButton> {
        match slot {
            ButtonSlot::Leading(i) => self.leading_buttons.get(i),
            ButtonSlot::Trailing(i) => self.trailing_buttons.get(i),
            _ => None,
        }
    }

    pub(crate) fn collect_images(&self, out: &mut Vec<(ElementId, ImageRef)>) {
        for button in &self.map_buttons {
            collect_unresolved(out, &button.element_id, button.image.as_ref());
        }
        for button in self.leading_buttons.iter().chain(&self.trailing_buttons) {
            button.collect_images(out);
        }
    }

    pub fn to_native(&self) -> NativeMap {
        NativeMap {
            element_id: self.element_id.clone(),
            map_buttons: self
                .map_buttons
                .iter()
                .map(|b| NativeMapButton {
                    element_id: b.element_id.clone(),
                    image: b.image.as_ref().and_then(ImageSlot::resolved),
                    enabled: b.enabled,
                    hidden: b.hidden,
                })
                .collect(),
            leading_buttons: self.leading_buttons.iter().map(BarButton::to_native).collect(),
            trailing_buttons: self.trailing_buttons.iter().map(BarButton::to_native).collect(),
            trips: self
                .trips
                .iter()
                .map(|trip| NativeTrip {
                    element_id: trip.element_id.clone(),
                    origin: trip.origin.clone(),
                    destination: trip.destination.clone(),
                    route_choices: trip.route_choices.iter().map(|c| c.element_id.clone()).collect(),
                })
                .collect(),
            automatically_hides_navigation_bar: self.automatically_hides_navigation_bar,
        }
    }
}
