//! Identifier registry.
//!
//! Maps remote element identifiers to live template objects. Templates live in
//! a generational arena keyed by [`EntryKey`]; there is deliberately no flat
//! `ElementId -> object` index. Lookups walk the visible stack root to leaf and
//! descend into each template, so anything popped off the stack stops resolving
//! the moment it is unregistered, and a stale [`EntryKey`] held across a pop
//! simply fails to resolve.

use slotmap::{SlotMap, new_key_type};

use crate::element::ElementId;
use crate::error::{BridgeError, Result};
use crate::host::HostHandle;
use crate::model::{Node, Template};

new_key_type! {
    /// Arena key of a registered template.
    ///
    /// Keys are generational: once the entry is removed, the key never
    /// resolves again even if the slot is reused.
    pub struct EntryKey;
}

/// Where an element lives: which registered template, and where inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementPath {
    pub entry: EntryKey,
    pub node: Node,
}

/// A registered template together with the host screen showing it.
#[derive(Debug)]
pub struct StackEntry {
    pub template: Template,
    pub handle: HostHandle,
}

/// Owner of every live template.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    entries: SlotMap<EntryKey, StackEntry>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
        }
    }

    /// Register a template shown by `handle`.
    ///
    /// Fails if a live template already has the same element id.
    pub fn register(&mut self, template: Template, handle: HostHandle) -> Result<EntryKey> {
        if let Some(existing) = self.template_key(template.element_id()) {
            tracing::debug!(
                target: "dashstack::registry",
                element_id = %template.element_id(),
                ?existing,
                "rejecting duplicate template id"
            );
            return Err(BridgeError::bad_arguments(format!(
                "template `{}` is already live",
                template.element_id()
            )));
        }

        let element_id = template.element_id().clone();
        let key = self.entries.insert(StackEntry { template, handle });
        tracing::trace!(target: "dashstack::registry", ?key, %element_id, "registered template");
        Ok(key)
    }

    /// Remove a template and, with it, every section, item and button it
    /// owns.
    pub fn unregister_subtree(&mut self, key: EntryKey) -> Option<StackEntry> {
        let entry = self.entries.remove(key)?;
        tracing::trace!(
            target: "dashstack::registry",
            ?key,
            element_id = %entry.template.element_id(),
            "unregistered template subtree"
        );
        Some(entry)
    }

    pub fn contains(&self, key: EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: EntryKey) -> Option<&StackEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: EntryKey) -> Option<&mut StackEntry> {
        self.entries.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the live template whose own id is `id`.
    pub fn template_key(&self, id: &ElementId) -> Option<EntryKey> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.template.element_id() == id)
            .map(|(key, _)| key)
    }

    /// Resolve `id` by walking `order` (root to leaf, then the modal) and
    /// descending into each template.
    ///
    /// `None` means the element is no longer visible; callers decide whether
    /// that is an error.
    pub fn lookup<I>(&self, order: I, id: &ElementId) -> Option<ElementPath>
    where
        I: IntoIterator<Item = EntryKey>,
    {
        order.into_iter().find_map(|entry| {
            let node = self.entries.get(entry)?.template.locate(id)?;
            Some(ElementPath { entry, node })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::payload::decode_template;
    use serde_json::json;

    fn list(id: &str, item: &str) -> Template {
        decode_template(
            "ListTemplate",
            json!({"elementId": id, "sections": [
                {"elementId": format!("{id}-s"), "items": [{"elementId": item, "text": item}]}
            ]}),
            &Limits::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_walks_root_to_leaf() {
        let mut registry = ElementRegistry::new();
        let root = registry.register(list("root", "shared"), HostHandle(1)).unwrap();
        let top = registry.register(list("top", "shared"), HostHandle(2)).unwrap();

        let path = registry.lookup([root, top], &"shared".into()).unwrap();
        assert_eq!(path.entry, root);
        assert_eq!(path.node, Node::Item { section: 0, row: 0 });

        let path = registry.lookup([root, top], &"top".into()).unwrap();
        assert_eq!(path, ElementPath { entry: top, node: Node::Template });
    }

    #[test]
    fn test_unregistered_subtree_stops_resolving() {
        let mut registry = ElementRegistry::new();
        let root = registry.register(list("root", "a"), HostHandle(1)).unwrap();
        let top = registry.register(list("top", "b"), HostHandle(2)).unwrap();

        let removed = registry.unregister_subtree(top).unwrap();
        assert_eq!(removed.handle, HostHandle(2));

        assert!(registry.lookup([root, top], &"b".into()).is_none());
        assert!(registry.lookup([root, top], &"top-s".into()).is_none());
        assert!(!registry.contains(top));
        assert!(registry.unregister_subtree(top).is_none());
    }

    #[test]
    fn test_stale_key_does_not_resolve_after_slot_reuse() {
        let mut registry = ElementRegistry::new();
        let old = registry.register(list("old", "a"), HostHandle(1)).unwrap();
        registry.unregister_subtree(old);
        let new = registry.register(list("new", "a"), HostHandle(2)).unwrap();

        assert_ne!(old, new);
        assert!(registry.get(old).is_none());
        assert!(registry.lookup([old], &"a".into()).is_none());
    }

    #[test]
    fn test_duplicate_template_id_is_rejected() {
        let mut registry = ElementRegistry::new();
        registry.register(list("root", "a"), HostHandle(1)).unwrap();
        let err = registry.register(list("root", "b"), HostHandle(2)).unwrap_err();
        assert_eq!(err.code(), "bad_arguments");
        assert_eq!(registry.len(), 1);
    }
}
