//! Navigation stack controller.
//!
//! Owns the ordering of stack entries and the single modal slot, and is the
//! only thing that drives the host's screen stack. Every structural operation
//! validates its constraints before touching the host, so a rejected command
//! leaves both the stack and the host exactly as they were.
//!
//! | operation | valid when | event |
//! |---|---|---|
//! | `set_root` | always (root-capable kind) | `active-template-changed` unless refreshed in place |
//! | `push` | root set, depth < max | `active-template-changed` |
//! | `pop` | depth > 1 | one per popped entry |
//! | `pop_to_root` | depth > 1 | `active-template-changed` |
//! | `present` | root set | `presentation-changed` (close, then open) |
//! | `close_present` | modal present | `presentation-changed(popped)` |

use std::collections::HashSet;

use dashstack_core::PerfSpan;

use crate::config::Limits;
use crate::element::{ElementId, ImageHandle, ImageRef};
use crate::error::{BridgeError, Result};
use crate::host::HostSurface;
use crate::model::{Node, Template};
use crate::payload::{decode_item_delta, decode_template_delta};
use crate::protocol::{EventChannel, OutboundEvent};
use crate::registry::{ElementPath, ElementRegistry, EntryKey, StackEntry};

/// Observable shape of the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackState {
    Empty,
    RootSet,
    /// `n` screens above the root.
    Pushed(usize),
    /// A template is presented over a stack of `depth` screens.
    Modal { depth: usize, presented: ElementId },
}

/// Entries an operation added, removed or refreshed, so the caller can start
/// or cancel work tied to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackChange {
    pub added: Option<EntryKey>,
    pub refreshed: Option<EntryKey>,
    pub removed: Vec<EntryKey>,
}

#[derive(Debug)]
pub struct NavigationStack {
    registry: ElementRegistry,
    order: Vec<EntryKey>,
    modal: Option<EntryKey>,
    max_depth: usize,
}

impl NavigationStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            registry: ElementRegistry::new(),
            order: Vec::new(),
            modal: None,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of stacked screens, root included, modal excluded.
    pub fn depth(&self) -> usize {
        self.order.len()
    }

    pub fn state(&self) -> StackState {
        if let Some(presented) = self.presented() {
            return StackState::Modal {
                depth: self.depth(),
                presented: presented.element_id().clone(),
            };
        }
        match self.depth() {
            0 => StackState::Empty,
            1 => StackState::RootSet,
            n => StackState::Pushed(n - 1),
        }
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn root(&self) -> Option<&Template> {
        self.template(*self.order.first()?)
    }

    /// Top of the navigation stack, ignoring any modal.
    pub fn top(&self) -> Option<&Template> {
        self.template(*self.order.last()?)
    }

    pub fn presented(&self) -> Option<&Template> {
        self.template(self.modal?)
    }

    pub fn template(&self, key: EntryKey) -> Option<&Template> {
        self.registry.get(key).map(|entry| &entry.template)
    }

    pub fn entry(&self, key: EntryKey) -> Option<&StackEntry> {
        self.registry.get(key)
    }

    /// Stack element ids, root first.
    pub fn stack_ids(&self) -> Vec<ElementId> {
        self.order
            .iter()
            .filter_map(|&key| self.template(key))
            .map(|t| t.element_id().clone())
            .collect()
    }

    /// Keys in lookup order: the stack root to leaf, then the modal.
    pub fn visible_keys(&self) -> impl Iterator<Item = EntryKey> + '_ {
        self.order.iter().copied().chain(self.modal)
    }

    pub fn lookup(&self, id: &ElementId) -> Option<ElementPath> {
        self.registry.lookup(self.visible_keys(), id)
    }

    fn release<H: HostSurface>(&mut self, key: EntryKey, host: &mut H) -> Option<StackEntry> {
        let entry = self.registry.unregister_subtree(key)?;
        host.release(entry.handle);
        Some(entry)
    }

    fn top_changed(&self, events: &mut EventChannel) {
        if let Some(top) = self.top() {
            events.emit(OutboundEvent::ActiveTemplateChanged {
                element_id: top.element_id().clone(),
            });
        }
    }

    /// Replace the bottom of the stack.
    ///
    /// A new root with the current root's id refreshes that screen in place
    /// and leaves everything above it, and any modal, alone. Any other id
    /// tears down the whole stack and starts fresh from the new root.
    #[tracing::instrument(
        target = "dashstack::stack",
        level = "trace",
        skip_all,
        fields(element_id = %template.element_id())
    )]
    pub fn set_root<H: HostSurface>(
        &mut self,
        template: Template,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Result<StackChange> {
        if !template.kind().is_root_capable() {
            return Err(BridgeError::bad_arguments(format!(
                "{} cannot be a root template",
                template.kind()
            )));
        }

        let same_root = self.order.first().copied().filter(|&root| {
            self.registry
                .get(root)
                .is_some_and(|entry| entry.template.element_id() == template.element_id())
        });
        if let Some(root) = same_root {
            self.check_unique_ids(&template, &[root])?;
            if let Some(entry) = self.registry.get_mut(root) {
                host.invalidate(entry.handle, &template.to_native())?;
                entry.template = template;
                tracing::debug!(target: "dashstack::stack", "root refreshed in place");
                return Ok(StackChange {
                    refreshed: Some(root),
                    ..StackChange::default()
                });
            }
        }

        // Only the modal survives a root replacement.
        self.check_unique_ids(&template, &self.order)?;

        let _perf = PerfSpan::new("replace_root");
        let handle = host.create_native_handle(&template.to_native())?;
        host.set_root_screen(handle)?;

        let removed: Vec<EntryKey> = self.order.drain(..).collect();
        for &key in &removed {
            self.release(key, host);
        }
        let key = self.registry.register(template, handle)?;
        self.order.push(key);

        tracing::debug!(target: "dashstack::stack", removed = removed.len(), "new root set");
        self.top_changed(events);
        Ok(StackChange {
            added: Some(key),
            removed,
            ..StackChange::default()
        })
    }

    #[tracing::instrument(
        target = "dashstack::stack",
        level = "trace",
        skip_all,
        fields(element_id = %template.element_id())
    )]
    pub fn push<H: HostSurface>(
        &mut self,
        template: Template,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Result<StackChange> {
        if self.order.is_empty() {
            return Err(BridgeError::NoActiveScreen("push requires a root template"));
        }
        if !template.kind().is_pushable() {
            return Err(BridgeError::bad_arguments(format!(
                "{} cannot be pushed",
                template.kind()
            )));
        }
        if self.depth() >= self.max_depth {
            tracing::debug!(target: "dashstack::stack", depth = self.depth(), "push rejected at max depth");
            return Err(BridgeError::StackDepthExceeded { max: self.max_depth });
        }
        self.check_unique_ids(&template, &[])?;

        let handle = host.create_native_handle(&template.to_native())?;
        host.push_screen(handle)?;
        let key = self.registry.register(template, handle)?;
        self.order.push(key);

        self.top_changed(events);
        Ok(StackChange {
            added: Some(key),
            ..StackChange::default()
        })
    }

    /// Pop up to `count` screens, never the root.
    ///
    /// Each popped screen produces exactly one event.
    pub fn pop<H: HostSurface>(
        &mut self,
        count: usize,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Result<StackChange> {
        if count == 0 {
            return Err(BridgeError::bad_arguments("pop count must be at least 1"));
        }
        if self.depth() <= 1 {
            return Err(BridgeError::NoActiveScreen("no screen above the root to pop"));
        }

        let mut change = StackChange::default();
        for _ in 0..count.min(self.depth() - 1) {
            host.pop_screen()?;
            let Some(key) = self.order.pop() else { break };
            let Some(entry) = self.release(key, host) else { continue };
            change.removed.push(key);

            if entry.template.kind().is_presentable() {
                events.emit(OutboundEvent::PresentationChanged {
                    element_id: entry.template.element_id().clone(),
                    popped: true,
                });
            } else {
                self.top_changed(events);
            }
        }
        Ok(change)
    }

    pub fn pop_to_root<H: HostSurface>(
        &mut self,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Result<StackChange> {
        if self.depth() <= 1 {
            return Err(BridgeError::NoActiveScreen("already at the root"));
        }

        host.pop_to_root_screen()?;
        let removed: Vec<EntryKey> = self.order.drain(1..).collect();
        for &key in &removed {
            self.release(key, host);
        }

        self.top_changed(events);
        Ok(StackChange {
            removed,
            ..StackChange::default()
        })
    }

    /// Present `template` modally, closing any current modal first.
    #[tracing::instrument(
        target = "dashstack::stack",
        level = "trace",
        skip_all,
        fields(element_id = %template.element_id())
    )]
    pub fn present<H: HostSurface>(
        &mut self,
        template: Template,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Result<StackChange> {
        if !template.kind().is_presentable() {
            return Err(BridgeError::bad_arguments(format!(
                "{} cannot be presented",
                template.kind()
            )));
        }
        if self.order.is_empty() {
            return Err(BridgeError::NoActiveScreen("present requires a root template"));
        }
        let replaced: Vec<EntryKey> = self.modal.into_iter().collect();
        self.check_unique_ids(&template, &replaced)?;

        let handle = host.create_native_handle(&template.to_native())?;

        let mut change = StackChange::default();
        if self.modal.is_some() {
            change.removed = self.close_present(host, events)?.removed;
        }

        host.present_screen(handle)?;
        let element_id = template.element_id().clone();
        let key = self.registry.register(template, handle)?;
        self.modal = Some(key);
        change.added = Some(key);

        events.emit(OutboundEvent::PresentationChanged {
            element_id,
            popped: false,
        });
        Ok(change)
    }

    pub fn close_present<H: HostSurface>(
        &mut self,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Result<StackChange> {
        let key = self
            .modal
            .ok_or(BridgeError::NoActiveScreen("no template is presented"))?;
        let handle = self
            .registry
            .get(key)
            .map(|entry| entry.handle)
            .ok_or(BridgeError::NoActiveScreen("no template is presented"))?;

        host.dismiss_screen(handle)?;
        self.modal = None;
        if let Some(entry) = self.release(key, host) {
            events.emit(OutboundEvent::PresentationChanged {
                element_id: entry.template.element_id().clone(),
                popped: true,
            });
        }
        Ok(StackChange {
            removed: vec![key],
            ..StackChange::default()
        })
    }

    /// The host popped its top screen on its own (back button).
    ///
    /// Returns `None` when there was nothing above the root to drop.
    pub fn on_host_popped<H: HostSurface>(
        &mut self,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Option<StackChange> {
        if self.depth() <= 1 {
            tracing::warn!(target: "dashstack::stack", depth = self.depth(), "host popped with nothing above the root");
            return None;
        }

        let key = self.order.pop()?;
        let entry = self.release(key, host)?;
        events.emit(OutboundEvent::BackButtonPressed {
            element_id: entry.template.element_id().clone(),
        });
        Some(StackChange {
            removed: vec![key],
            ..StackChange::default()
        })
    }

    /// The host dismissed the modal on its own.
    pub fn on_host_dismissed<H: HostSurface>(
        &mut self,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Option<StackChange> {
        let key = self.modal.take()?;
        let entry = self.release(key, host)?;
        events.emit(OutboundEvent::PresentationChanged {
            element_id: entry.template.element_id().clone(),
            popped: true,
        });
        Some(StackChange {
            removed: vec![key],
            ..StackChange::default()
        })
    }

    /// Reject `template` when one of its ids is duplicated or already live
    /// in an entry other than those about to be `replaced`.
    fn check_unique_ids(&self, template: &Template, replaced: &[EntryKey]) -> Result<()> {
        let mut seen = HashSet::new();
        for id in template.element_ids() {
            if !seen.insert(id) {
                return Err(BridgeError::bad_arguments(format!(
                    "element `{id}` appears twice in template `{}`",
                    template.element_id()
                )));
            }
            if let Some(path) = self.lookup(id) {
                if !replaced.contains(&path.entry) {
                    tracing::debug!(target: "dashstack::stack", element_id = %id, "id clash rejected");
                    return Err(BridgeError::bad_arguments(format!("element `{id}` is already live")));
                }
            }
        }
        Ok(())
    }

    fn require(&self, id: &ElementId) -> Result<ElementPath> {
        self.lookup(id)
            .ok_or_else(|| BridgeError::TargetNotFound(id.clone()))
    }

    fn redraw<H: HostSurface>(&self, key: EntryKey, host: &mut H) -> Result<()> {
        if let Some(entry) = self.registry.get(key) {
            host.invalidate(entry.handle, &entry.template.to_native())?;
        }
        Ok(())
    }

    /// Apply a template delta in place. Returns the entry and whether the
    /// host was asked to redraw.
    pub fn update_template<H: HostSurface>(
        &mut self,
        id: &ElementId,
        delta: serde_json::Value,
        limits: &Limits,
        host: &mut H,
    ) -> Result<(EntryKey, bool)> {
        let path = self.require(id)?;
        if path.node != Node::Template {
            return Err(BridgeError::bad_arguments(format!("`{id}` is not a template")));
        }
        let entry = self
            .registry
            .get_mut(path.entry)
            .ok_or_else(|| BridgeError::TargetNotFound(id.clone()))?;

        let delta = decode_template_delta(entry.template.kind(), delta)?;
        let changed = entry.template.apply_delta(delta, limits)?;
        if changed {
            self.redraw(path.entry, host)?;
        }
        Ok((path.entry, changed))
    }

    /// Apply an item delta in place.
    pub fn update_item<H: HostSurface>(
        &mut self,
        id: &ElementId,
        delta: serde_json::Value,
        host: &mut H,
    ) -> Result<(EntryKey, bool)> {
        let delta = decode_item_delta(delta)?;
        let path = self.require(id)?;
        let Node::Item { section, row } = path.node else {
            return Err(BridgeError::bad_arguments(format!("`{id}` is not a list item")));
        };

        let changed = self
            .registry
            .get_mut(path.entry)
            .and_then(|entry| entry.template.item_mut(section, row))
            .map(|item| item.apply(delta))
            .ok_or_else(|| BridgeError::TargetNotFound(id.clone()))?;
        if changed {
            self.redraw(path.entry, host)?;
        }
        Ok((path.entry, changed))
    }

    /// Host reports a row tap. Emits `item-selected` at most once per
    /// selection cycle; taps on gone, disabled or passive rows are dropped.
    pub fn on_item_selected<H: HostSurface>(
        &mut self,
        id: &ElementId,
        host: &mut H,
        events: &mut EventChannel,
    ) -> Result<bool> {
        let Some(ElementPath {
            entry,
            node: Node::Item { section, row },
        }) = self.lookup(id)
        else {
            tracing::debug!(target: "dashstack::stack", element_id = %id, "selection of non-item dropped");
            return Ok(false);
        };

        let started = self
            .registry
            .get_mut(entry)
            .and_then(|e| e.template.item_mut(section, row))
            .is_some_and(|item| item.begin_selection());
        if !started {
            return Ok(false);
        }

        self.redraw(entry, host)?;
        events.emit(OutboundEvent::ItemSelected {
            element_id: id.clone(),
        });
        Ok(true)
    }

    /// The remote driver finished handling a selection.
    ///
    /// Returns whether a pending selection was released.
    pub fn acknowledge_selection<H: HostSurface>(&mut self, id: &ElementId, host: &mut H) -> Result<bool> {
        let path = self.require(id)?;
        let Node::Item { section, row } = path.node else {
            return Err(BridgeError::bad_arguments(format!("`{id}` is not a list item")));
        };

        let released = self
            .registry
            .get_mut(path.entry)
            .and_then(|e| e.template.item_mut(section, row))
            .is_some_and(|item| item.acknowledge_selection());
        if released {
            self.redraw(path.entry, host)?;
        }
        Ok(released)
    }

    /// Host reports a button tap. Dropped unless the button is live and
    /// enabled.
    pub fn on_button_pressed(&self, id: &ElementId, events: &mut EventChannel) -> bool {
        let enabled = match self.lookup(id) {
            Some(ElementPath {
                entry,
                node: Node::Button(slot),
            }) => self
                .template(entry)
                .and_then(|t| t.button_enabled(slot))
                .unwrap_or(false),
            _ => false,
        };

        if enabled {
            events.emit(OutboundEvent::ButtonPressed {
                element_id: id.clone(),
            });
        } else {
            tracing::debug!(target: "dashstack::stack", element_id = %id, "button press dropped");
        }
        enabled
    }

    /// Host reports new search text for a searchable list.
    pub fn on_search_text(&self, id: &ElementId, text: String, events: &mut EventChannel) -> bool {
        let searchable = matches!(
            self.lookup(id),
            Some(ElementPath { entry, node: Node::Template })
                if self.template(entry).is_some_and(Template::is_searchable)
        );
        if searchable {
            events.emit(OutboundEvent::SearchTextChanged {
                element_id: id.clone(),
                text,
            });
        }
        searchable
    }

    /// Store a resolved image if its entry and element are still live.
    pub fn apply_image<H: HostSurface>(
        &mut self,
        key: EntryKey,
        element: &ElementId,
        reference: &ImageRef,
        image: ImageHandle,
        host: &mut H,
    ) -> Result<bool> {
        let applied = self
            .registry
            .get_mut(key)
            .is_some_and(|entry| entry.template.apply_image(element, reference, image));
        if applied {
            self.redraw(key, host)?;
        }
        Ok(applied)
    }

    /// Redraw every visible screen.
    pub fn refresh_all<H: HostSurface>(&self, host: &mut H) -> Result<usize> {
        let _perf = PerfSpan::new("refresh_all");
        let keys: Vec<EntryKey> = self.visible_keys().collect();
        for &key in &keys {
            self.redraw(key, host)?;
        }
        tracing::debug!(target: "dashstack::stack", screens = keys.len(), "full refresh");
        Ok(keys.len())
    }
}
