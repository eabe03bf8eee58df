//! Tracing conventions shared by both crates.
//!
//! Nothing here installs a subscriber; the embedding application decides
//! where logs go. Filter per subsystem with the [`targets`] names:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("dashstack::stack=debug,dashstack_core=info")
//!     .init();
//! ```

/// Log targets, one per subsystem.
pub mod targets {
    pub const CORE: &str = "dashstack_core";
    pub const LOOP: &str = "dashstack_core::loop";
    pub const TIMER: &str = "dashstack_core::timer";
    pub const POOL: &str = "dashstack_core::pool";
    /// Spans opened by [`super::PerfSpan`].
    pub const PERF: &str = "dashstack::perf";
    pub const STACK: &str = "dashstack::stack";
    pub const REGISTRY: &str = "dashstack::registry";
    pub const PROTOCOL: &str = "dashstack::protocol";
    pub const LIFECYCLE: &str = "dashstack::lifecycle";
    pub const REFRESH: &str = "dashstack::refresh";
    pub const IMAGE: &str = "dashstack::image";
    pub const SESSION: &str = "dashstack::session";
}

/// Holds an `info` span open around an expensive operation until dropped.
#[derive(Debug)]
#[must_use = "the span closes as soon as the guard is dropped"]
pub struct PerfSpan {
    _entered: tracing::span::EnteredSpan,
}

impl PerfSpan {
    pub fn new(operation: &'static str) -> Self {
        let span = tracing::info_span!(target: "dashstack::perf", "perf", operation);
        Self {
            _entered: span.entered(),
        }
    }
}

/// `trace!` under the core target.
#[macro_export]
macro_rules! dashstack_trace {
    ($($arg:tt)*) => { tracing::trace!(target: "dashstack_core", $($arg)*) };
}

/// `debug!` under the core target.
#[macro_export]
macro_rules! dashstack_debug {
    ($($arg:tt)*) => { tracing::debug!(target: "dashstack_core", $($arg)*) };
}

/// `info!` under the core target.
#[macro_export]
macro_rules! dashstack_info {
    ($($arg:tt)*) => { tracing::info!(target: "dashstack_core", $($arg)*) };
}

/// `warn!` under the core target.
#[macro_export]
macro_rules! dashstack_warn {
    ($($arg:tt)*) => { tracing::warn!(target: "dashstack_core", $($arg)*) };
}

/// `error!` under the core target.
#[macro_export]
macro_rules! dashstack_error {
    ($($arg:tt)*) => { tracing::error!(target: "dashstack_core", $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span_and_macros() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let _perf = PerfSpan::new("refresh_all");
        dashstack_trace!("trace");
        dashstack_debug!(depth = 2, "debug");
        dashstack_info!("info");
        dashstack_warn!("warn");
        dashstack_error!("error");
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [targets::LOOP, targets::TIMER, targets::POOL] {
            assert!(target.starts_with(targets::CORE));
        }
        for target in [targets::STACK, targets::PERF, targets::SESSION] {
            assert!(target.starts_with("dashstack::"));
        }
    }
}
