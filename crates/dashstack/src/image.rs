//! Asynchronous image resolution.
//!
//! Templates carry image references that the host cannot show until they are
//! resolved (fetched, decoded). Resolution runs off the UI thread; the result
//! is posted back to the session's loop as [`SessionMessage::ImageResolved`]
//! and applied there only if the target element is still live and still points
//! at the same reference. Loads belonging to a popped screen are cancelled on a
//! best-effort basis, and anything that slips through is discarded on arrival.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashstack_core::{CancellationToken, LoopProxy, PoolError, WorkerPool, WorkerPoolConfig};

use crate::config::BridgeConfig;
use crate::element::{ElementId, ImageHandle, ImageRef};
use crate::registry::EntryKey;
use crate::session::SessionMessage;

/// Outcome of a single load.
pub type ImageLoadResult = Result<ImageHandle, String>;

/// What to load and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRequest {
    pub entry: EntryKey,
    pub element: ElementId,
    pub reference: ImageRef,
}

/// A finished load, on its way back to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCompletion {
    pub request: ImageRequest,
    pub result: ImageLoadResult,
}

/// The image-loading collaborator.
pub trait ImageResolver: Send {
    /// Start resolving `request`. The completion must be posted to `proxy`
    /// as [`SessionMessage::ImageResolved`].
    fn resolve(&self, request: ImageRequest, proxy: &LoopProxy<SessionMessage>) -> CancellationToken;
}

type Loader = dyn Fn(&ImageRef, &CancellationToken) -> ImageLoadResult + Send + Sync;

/// Runs a loader function on the worker pool.
pub struct PooledImageResolver {
    pool: WorkerPool,
    loader: Arc<Loader>,
}

impl std::fmt::Debug for PooledImageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledImageResolver")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl PooledImageResolver {
    pub fn new<F>(workers: usize, loader: F) -> Result<Self, PoolError>
    where
        F: Fn(&ImageRef, &CancellationToken) -> ImageLoadResult + Send + Sync + 'static,
    {
        let config = WorkerPoolConfig {
            thread_name: "dashstack-image".to_string(),
            ..WorkerPoolConfig::with_threads(workers.max(1))
        };
        Ok(Self {
            pool: WorkerPool::new(config)?,
            loader: Arc::new(loader),
        })
    }

    /// A resolver with the configured number of image workers.
    pub fn from_config<F>(config: &BridgeConfig, loader: F) -> Result<Self, PoolError>
    where
        F: Fn(&ImageRef, &CancellationToken) -> ImageLoadResult + Send + Sync + 'static,
    {
        Self::new(config.image_workers, loader)
    }

    /// Block until every load has finished. Mostly useful in tests.
    pub fn wait_idle(&self) {
        self.pool.wait_idle();
    }
}

impl ImageResolver for PooledImageResolver {
    fn resolve(&self, request: ImageRequest, proxy: &LoopProxy<SessionMessage>) -> CancellationToken {
        let loader = self.loader.clone();
        tracing::trace!(target: "dashstack::image", reference = %request.reference, "resolving image");
        self.pool.spawn_posting(proxy, move |token| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| loader(&request.reference, token)))
                .unwrap_or_else(|_| {
                    tracing::error!(target: "dashstack::image", reference = %request.reference, "image loader panicked");
                    Err("loader panicked".to_string())
                });
            if token.is_cancelled() {
                tracing::trace!(target: "dashstack::image", reference = %request.reference, "load cancelled");
                return None;
            }
            Some(SessionMessage::ImageResolved(ImageCompletion { request, result }))
        })
    }
}

/// A shared resolver works too, e.g. one the embedder also waits on.
impl<R: ImageResolver + Sync> ImageResolver for Arc<R> {
    fn resolve(&self, request: ImageRequest, proxy: &LoopProxy<SessionMessage>) -> CancellationToken {
        (**self).resolve(request, proxy)
    }
}

#[derive(Debug)]
struct PendingLoad {
    element: ElementId,
    reference: ImageRef,
    token: CancellationToken,
}

/// In-flight loads, grouped by the stack entry they belong to.
#[derive(Debug, Default)]
pub struct PendingImages {
    by_entry: HashMap<EntryKey, Vec<PendingLoad>>,
}

impl PendingImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, entry: EntryKey, element: &ElementId, reference: &ImageRef) -> bool {
        self.by_entry.get(&entry).is_some_and(|loads| {
            loads
                .iter()
                .any(|load| &load.element == element && &load.reference == reference)
        })
    }

    pub fn insert(&mut self, request: &ImageRequest, token: CancellationToken) {
        self.by_entry.entry(request.entry).or_default().push(PendingLoad {
            element: request.element.clone(),
            reference: request.reference.clone(),
            token,
        });
    }

    /// Remove a finished load. Returns `false` if it was no longer tracked,
    /// meaning it was cancelled and its result must be discarded.
    pub fn complete(&mut self, request: &ImageRequest) -> bool {
        let Some(loads) = self.by_entry.get_mut(&request.entry) else {
            return false;
        };
        let Some(index) = loads
            .iter()
            .position(|load| load.element == request.element && load.reference == request.reference)
        else {
            return false;
        };
        loads.swap_remove(index);
        if loads.is_empty() {
            self.by_entry.remove(&request.entry);
        }
        true
    }

    /// Cancel every load for `entry`.
    pub fn cancel_entry(&mut self, entry: EntryKey) -> usize {
        let Some(loads) = self.by_entry.remove(&entry) else {
            return 0;
        };
        for load in &loads {
            load.token.cancel();
        }
        tracing::debug!(target: "dashstack::image", count = loads.len(), "cancelled image loads for removed screen");
        loads.len()
    }

    pub fn len(&self) -> usize {
        self.by_entry.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashstack_core::{LoopEvent, MessageLoop};
    use slotmap::SlotMap;
    use std::time::Instant;

    fn keys(n: usize) -> Vec<EntryKey> {
        let mut map: SlotMap<EntryKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn request(entry: EntryKey, element: &str, reference: &str) -> ImageRequest {
        ImageRequest {
            entry,
            element: ElementId::new(element),
            reference: ImageRef::new(reference),
        }
    }

    #[test]
    fn test_pooled_resolver_posts_completion() {
        let resolver = PooledImageResolver::new(1, |reference, _| {
            Ok(ImageHandle(reference.as_str().len() as u64))
        })
        .unwrap();
        let mut ui_loop = MessageLoop::new();
        let key = keys(1)[0];

        resolver.resolve(request(key, "row", "abcd"), &ui_loop.proxy());
        resolver.wait_idle();

        let events = ui_loop.pump_at(Instant::now());
        assert_eq!(events.len(), 1);
        let LoopEvent::Message(SessionMessage::ImageResolved(done)) = &events[0] else {
            panic!("expected an image completion, got {:?}", events[0]);
        };
        assert_eq!(done.result, Ok(ImageHandle(4)));
        assert_eq!(done.request.element.as_str(), "row");
    }

    #[test]
    fn test_panicking_loader_posts_failure() {
        let resolver = PooledImageResolver::new(1, |_, _| panic!("decoder blew up")).unwrap();
        let mut ui_loop = MessageLoop::new();
        let key = keys(1)[0];

        resolver.resolve(request(key, "row", "asset://bad"), &ui_loop.proxy());
        resolver.wait_idle();

        let events = ui_loop.pump_at(Instant::now());
        assert_eq!(events.len(), 1);
        let LoopEvent::Message(SessionMessage::ImageResolved(done)) = &events[0] else {
            panic!("expected an image completion, got {:?}", events[0]);
        };
        assert_eq!(done.result, Err("loader panicked".to_string()));
    }

    #[test]
    fn test_cancelled_entry_discards_completion() {
        let keys = keys(2);
        let mut pending = PendingImages::new();
        let a = request(keys[0], "a", "one");
        let b = request(keys[1], "b", "two");
        let token = CancellationToken::new();
        pending.insert(&a, token.clone());
        pending.insert(&b, CancellationToken::new());

        assert_eq!(pending.cancel_entry(keys[0]), 1);
        assert!(token.is_cancelled());
        assert!(!pending.complete(&a));
        assert!(pending.complete(&b));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pending_is_keyed_by_reference() {
        let key = keys(1)[0];
        let mut pending = PendingImages::new();
        pending.insert(&request(key, "a", "one"), CancellationToken::new());

        assert!(pending.is_pending(key, &ElementId::new("a"), &ImageRef::new("one")));
        assert!(!pending.is_pending(key, &ElementId::new("a"), &ImageRef::new("two")));
        assert_eq!(pending.len(), 1);
    }
}
