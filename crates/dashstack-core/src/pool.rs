//! Worker pool for off-UI-thread work.
//!
//! Built on rayon. Work that produces something the UI thread needs (a decoded
//! image, a fetched asset) is spawned with [`WorkerPool::spawn_posting`], which
//! posts the result back onto a [`MessageLoop`](crate::MessageLoop) as a typed
//! message instead of touching UI state from the worker.
//!
//! # Example
//!
//! ```
//! use dashstack_core::{LoopEvent, MessageLoop, WorkerPool, WorkerPoolConfig};
//! use std::time::Instant;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::with_threads(1)).unwrap();
//! let mut ui_loop = MessageLoop::<u32>::new();
//!
//! let token = pool.spawn_posting(&ui_loop.proxy(), |_token| Some(6 * 7));
//! pool.wait_idle();
//!
//! assert!(!token.is_cancelled());
//! assert_eq!(ui_loop.pump_at(Instant::now()), vec![LoopEvent::Message(42)]);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool as RayonThreadPool, ThreadPoolBuilder};

use crate::error::PoolError;
use crate::message_loop::LoopProxy;

/// A cancellation token for cooperative, best-effort cancellation.
///
/// Cancelling never interrupts running work; the task checks the token and
/// gives up early, and the owner still re-validates any result it receives.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Configuration for creating a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads. `None` means use the number of CPU cores.
    pub num_threads: Option<usize>,
    /// Name prefix for worker threads.
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name: "dashstack-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a new configuration with a fixed thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct ActiveTasks {
    count: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl ActiveTasks {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn end(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.idle_lock.lock();
            self.idle.notify_all();
        }
    }
}

/// A pool of background worker threads.
pub struct WorkerPool {
    pool: RayonThreadPool,
    active: Arc<ActiveTasks>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.pool.current_num_threads())
            .field("active", &self.active_tasks())
            .finish()
    }
}

impl WorkerPool {
    /// Create a new pool with the given configuration.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        let thread_name = config.thread_name;
        let mut builder =
            ThreadPoolBuilder::new().thread_name(move |index| format!("{thread_name}-{index}"));

        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads);
        }

        let pool = builder
            .build()
            .map_err(|e| PoolError::CreationFailed(e.to_string()))?;
        crate::dashstack_debug!(threads = pool.current_num_threads(), "worker pool created");

        Ok(Self {
            pool,
            active: Arc::new(ActiveTasks::default()),
        })
    }

    /// Get the number of threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Get the number of tasks spawned but not yet finished.
    pub fn active_tasks(&self) -> usize {
        self.active.count.load(Ordering::Acquire)
    }

    /// Run `task` on a worker and post its result to `proxy`.
    ///
    /// The task receives the returned token; returning `None` (typically after
    /// noticing cancellation) posts nothing. A panicking task is logged and
    /// posts nothing; it never takes the pool down.
    pub fn spawn_posting<M, F>(&self, proxy: &LoopProxy<M>, task: F) -> CancellationToken
    where
        M: Send + 'static,
        F: FnOnce(&CancellationToken) -> Option<M> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let proxy = proxy.clone();
        let active = self.active.clone();
        active.begin();

        self.pool.spawn(move || {
            if !task_token.is_cancelled() {
                match panic::catch_unwind(AssertUnwindSafe(|| task(&task_token))) {
                    Ok(Some(message)) => {
                        if proxy.post(message).is_err() {
                            crate::dashstack_debug!("message loop gone; dropping worker result");
                        }
                    }
                    Ok(None) => {}
                    Err(_) => crate::dashstack_error!("worker task panicked"),
                }
            }
            active.end();
        });

        token
    }

    /// Block until every spawned task has finished.
    pub fn wait_idle(&self) {
        let mut guard = self.active.idle_lock.lock();
        while self.active.count.load(Ordering::Acquire) > 0 {
            self.active.idle.wait_for(&mut guard, Duration::from_millis(10));
        }
    }
}
