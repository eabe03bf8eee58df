//! The host UI surface boundary.
//!
//! [`HostSurface`] is what the navigation stack drives: it turns
//! [`NativeTemplate`] snapshots into screens and manages the host's own screen
//! stack. The real implementation lives in the embedding application;
//! [`MemoryHost`] is an in-memory surface that records every call.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::BridgeError;
use crate::model::NativeTemplate;

/// Opaque handle to a host screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostHandle(pub u64);

/// The host toolkit could not carry out a call.
///
/// This is never a constraint violation; those are caught before the host is
/// touched. A `HostError` means the toolkit itself is gone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl From<HostError> for BridgeError {
    fn from(err: HostError) -> Self {
        BridgeError::HostUnavailable(err.0)
    }
}

/// Operations the bridge needs from the host UI toolkit.
///
/// Only ever called on the UI thread.
pub trait HostSurface {
    /// Build a screen for `template` without showing it.
    fn create_native_handle(&mut self, template: &NativeTemplate) -> Result<HostHandle, HostError>;

    /// Redraw an existing screen with new content.
    fn invalidate(&mut self, handle: HostHandle, template: &NativeTemplate) -> Result<(), HostError>;

    /// Replace the whole host stack with a single root screen.
    fn set_root_screen(&mut self, handle: HostHandle) -> Result<(), HostError>;

    fn push_screen(&mut self, handle: HostHandle) -> Result<(), HostError>;

    /// Pop the top screen.
    fn pop_screen(&mut self) -> Result<(), HostError>;

    fn pop_to_root_screen(&mut self) -> Result<(), HostError>;

    fn present_screen(&mut self, handle: HostHandle) -> Result<(), HostError>;

    fn dismiss_screen(&mut self, handle: HostHandle) -> Result<(), HostError>;

    /// The screen is no longer referenced by the bridge.
    fn release(&mut self, _handle: HostHandle) {}
}

/// A recorded [`HostSurface`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    Create(HostHandle),
    Invalidate(HostHandle),
    SetRoot(HostHandle),
    Push(HostHandle),
    Pop,
    PopToRoot,
    Present(HostHandle),
    Dismiss(HostHandle),
    Release(HostHandle),
}

/// An in-memory host surface.
///
/// Keeps its own screen stack and the latest snapshot per handle, and records
/// every call in order. Can be switched to an unavailable state to exercise
/// fatal host failures.
#[derive(Debug, Default)]
pub struct MemoryHost {
    next_handle: u64,
    natives: HashMap<HostHandle, NativeTemplate>,
    screens: Vec<HostHandle>,
    presented: Option<HostHandle>,
    calls: Vec<HostCall>,
    invalidations: HashMap<HostHandle, usize>,
    unavailable: bool,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    /// Drain the recorded calls.
    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }

    /// Host screen stack, root first.
    pub fn screens(&self) -> &[HostHandle] {
        &self.screens
    }

    pub fn presented(&self) -> Option<HostHandle> {
        self.presented
    }

    pub fn native(&self, handle: HostHandle) -> Option<&NativeTemplate> {
        self.natives.get(&handle)
    }

    /// Snapshot shown by the top of the screen stack.
    pub fn top_native(&self) -> Option<&NativeTemplate> {
        self.screens.last().and_then(|handle| self.natives.get(handle))
    }

    pub fn presented_native(&self) -> Option<&NativeTemplate> {
        self.presented.and_then(|handle| self.natives.get(&handle))
    }

    /// How many times `handle` has been redrawn.
    pub fn invalidations(&self, handle: HostHandle) -> usize {
        self.invalidations.get(&handle).copied().unwrap_or(0)
    }

    fn check(&self) -> Result<(), HostError> {
        if self.unavailable {
            return Err(HostError("host surface is not available".into()));
        }
        Ok(())
    }
}

impl HostSurface for MemoryHost {
    fn create_native_handle(&mut self, template: &NativeTemplate) -> Result<HostHandle, HostError> {
        self.check()?;
        self.next_handle += 1;
        let handle = HostHandle(self.next_handle);
        self.natives.insert(handle, template.clone());
        self.calls.push(HostCall::Create(handle));
        Ok(handle)
    }

    fn invalidate(&mut self, handle: HostHandle, template: &NativeTemplate) -> Result<(), HostError> {
        self.check()?;
        self.natives.insert(handle, template.clone());
        *self.invalidations.entry(handle).or_default() += 1;
        self.calls.push(HostCall::Invalidate(handle));
        Ok(())
    }

    fn set_root_screen(&mut self, handle: HostHandle) -> Result<(), HostError> {
        self.check()?;
        self.screens.clear();
        self.screens.push(handle);
        self.calls.push(HostCall::SetRoot(handle));
        Ok(())
    }

    fn push_screen(&mut self, handle: HostHandle) -> Result<(), HostError> {
        self.check()?;
        self.screens.push(handle);
        self.calls.push(HostCall::Push(handle));
        Ok(())
    }

    fn pop_screen(&mut self) -> Result<(), HostError> {
        self.check()?;
        self.screens.pop();
        self.calls.push(HostCall::Pop);
        Ok(())
    }

    fn pop_to_root_screen(&mut self) -> Result<(), HostError> {
        self.check()?;
        self.screens.truncate(1);
        self.calls.push(HostCall::PopToRoot);
        Ok(())
    }

    fn present_screen(&mut self, handle: HostHandle) -> Result<(), HostError> {
        self.check()?;
        self.presented = Some(handle);
        self.calls.push(HostCall::Present(handle));
        Ok(())
    }

    fn dismiss_screen(&mut self, handle: HostHandle) -> Result<(), HostError> {
        self.check()?;
        if self.presented == Some(handle) {
            self.presented = None;
        }
        self.calls.push(HostCall::Dismiss(handle));
        Ok(())
    }

    fn release(&mut self, handle: HostHandle) {
        self.natives.remove(&handle);
        self.invalidations.remove(&handle);
        self.calls.push(HostCall::Release(handle));
    }
}
