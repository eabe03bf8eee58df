//! Identifiers and image references shared by every template type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque identifier assigned by the remote driver.
///
/// Unique per live template tree. The bridge never invents these; it only
/// routes by them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Wrap a remote identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A remote image reference: a URL, a bundled asset name, or anything else the
/// image collaborator understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded image, as handed back by the image collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(pub u64);

/// An image reference together with its resolution state.
///
/// Deserializes from a bare reference string; the resolved handle only ever
/// comes from the image collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ImageRef")]
pub struct ImageSlot {
    reference: ImageRef,
    resolved: Option<ImageHandle>,
}

impl ImageSlot {
    pub fn new(reference: ImageRef) -> Self {
        Self {
            reference,
            resolved: None,
        }
    }

    pub fn reference(&self) -> &ImageRef {
        &self.reference
    }

    pub fn resolved(&self) -> Option<ImageHandle> {
        self.resolved
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Store a resolved image if it still belongs to this slot.
    ///
    /// Returns `false` when the slot has since been pointed at a different
    /// reference, in which case the late result is ignored.
    pub fn resolve(&mut self, reference: &ImageRef, handle: ImageHandle) -> bool {
        if &self.reference != reference {
            return false;
        }
        self.resolved = Some(handle);
        true
    }
}

impl From<ImageRef> for ImageSlot {
    fn from(reference: ImageRef) -> Self {
        Self::new(reference)
    }
}

/// Push the unresolved image of `slot`, if any, onto `out`.
pub(crate) fn collect_unresolved(
    out: &mut Vec<(ElementId, ImageRef)>,
    owner: &ElementId,
    slot: Option<&ImageSlot>,
) {
    if let Some(slot) = slot {
        if !slot.is_resolved() {
            out.push((owner.clone(), slot.reference.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_slot_ignores_stale_reference() {
        let mut slot = ImageSlot::new(ImageRef::new("asset://home"));
        assert!(!slot.resolve(&ImageRef::new("asset://work"), ImageHandle(1)));
        assert!(!slot.is_resolved());

        assert!(slot.resolve(&ImageRef::new("asset://home"), ImageHandle(2)));
        assert_eq!(slot.resolved(), Some(ImageHandle(2)));
    }

    #[test]
    fn test_image_slot_deserializes_from_string() {
        let slot: ImageSlot = serde_json::from_str("\"https://cdn/cover.png\"").unwrap();
        assert_eq!(slot.reference().as_str(), "https://cdn/cover.png");
        assert!(!slot.is_resolved());
    }
}
