//! UI-thread ownership checks.
//!
//! Stack, registry and host handles live on one thread. The owner records a
//! [`ThreadAffinity`] at construction and checks it before mutating; other
//! threads post through a [`crate::LoopProxy`] instead.
//!
//! ```
//! use dashstack_core::ThreadAffinity;
//!
//! let owner = ThreadAffinity::current();
//! assert!(owner.is_same_thread());
//!
//! let elsewhere = std::thread::spawn(move || owner.is_same_thread()).join().unwrap();
//! assert!(!elsewhere);
//! ```

use std::thread::{self, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Owned by the calling thread.
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    #[inline]
    pub fn is_same_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// # Panics
    ///
    /// When called off the owning thread, in every build.
    #[inline]
    pub fn assert_same_thread(&self) {
        if !self.is_same_thread() {
            self.violation();
        }
    }

    /// [`assert_same_thread`](Self::assert_same_thread) in debug builds only.
    #[inline]
    pub fn debug_assert_same_thread(&self) {
        #[cfg(debug_assertions)]
        self.assert_same_thread();
    }

    #[cold]
    #[inline(never)]
    fn violation(&self) -> ! {
        let here = thread::current();
        panic!(
            "UI-thread state touched from thread {:?} ({:?}); owner is {:?}. \
             Post through the loop proxy instead.",
            here.name().unwrap_or("<unnamed>"),
            here.id(),
            self.owner,
        )
    }
}
