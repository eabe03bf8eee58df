//! Core systems for dashstack.
//!
//! This crate provides the UI-thread plumbing the template bridge is built on:
//!
//! - **Message Loop**: a single-threaded loop that owns UI state and receives
//!   typed messages from other threads through [`LoopProxy`]
//! - **Timers**: one-shot timers with an explicit clock, used for debouncing
//! - **Worker Pool**: rayon-backed background work that posts results back to
//!   the loop, with best-effort cancellation
//! - **Reply Slots**: blocking request/response across threads
//! - **Thread Affinity**: assertions that UI state is only touched on its thread
//!
//! # Example
//!
//! ```
//! use dashstack_core::{LoopEvent, MessageLoop};
//! use std::ops::ControlFlow;
//!
//! let mut ui_loop = MessageLoop::<String>::new();
//! let proxy = ui_loop.proxy();
//!
//! std::thread::spawn(move || {
//!     proxy.post("push-template".to_string()).unwrap();
//!     proxy.quit().unwrap();
//! });
//!
//! let mut handled = Vec::new();
//! ui_loop.run(|event| {
//!     if let LoopEvent::Message(method) = event {
//!         handled.push(method);
//!     }
//!     ControlFlow::Continue(())
//! });
//! assert_eq!(handled, vec!["push-template".to_string()]);
//! ```

mod error;
mod event;
pub mod invocation;
pub mod logging;
mod message_loop;
pub mod pool;
pub mod thread_check;
mod timer;

pub use error::{CoreError, LoopError, PoolError, Result, TimerError};
pub use event::{EventPriority, LoopEvent};
pub use invocation::{ReplyReceiver, ReplySender, reply_pair};
pub use logging::PerfSpan;
pub use message_loop::{LoopProxy, MessageLoop};
pub use pool::{CancellationToken, WorkerPool, WorkerPoolConfig};
pub use thread_check::ThreadAffinity;
pub use timer::{TimerId, TimerManager};

static_assertions::assert_impl_all!(LoopProxy<u8>: Send, Sync, Clone);
static_assertions::assert_impl_all!(ReplySender<u8>: Send);
static_assertions::assert_impl_all!(WorkerPool: Send, Sync);
