//! Test utilities.
//!
//! Shared helpers for unit and integration tests:
//! - consistent tracing-based logging initialization
//! - loop/node constructors
//! - terminal-state assertion macros

use crate::node::Deferred;
use crate::sched::TickLoop;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Creates a fresh loop plus one pending node bound to it.
#[must_use]
pub fn pending_on_loop() -> (TickLoop, Deferred) {
    init_test_logging();
    let lp = TickLoop::new();
    let d = Deferred::new(lp.handle());
    (lp, d)
}

/// Returns the first result slot of a succeeded node as a concrete type.
#[must_use]
pub fn succeeded_value<T: Clone + 'static>(d: &Deferred) -> Option<T> {
    match d.state() {
        crate::NodeState::Succeeded(values) => values
            .first()
            .and_then(|v| v.downcast_ref::<T>())
            .cloned(),
        _ => None,
    }
}

/// Assert that a node succeeded; optionally check its first result slot.
#[macro_export]
macro_rules! assert_succeeded {
    ($d:expr) => {
        assert!(
            $d.is_succeeded(),
            "expected a succeeded node, got {}",
            $d.state().name()
        );
    };
    ($d:expr, $ty:ty, $expected:expr) => {
        match $d.state() {
            $crate::NodeState::Succeeded(values) => {
                let got = $crate::get::<$ty>(&values, 0).unwrap_or_else(|| {
                    panic!("first result slot is not a {}", stringify!($ty))
                });
                assert_eq!(*got, $expected);
            }
            other => unreachable!("expected a succeeded node, got {other:?}"),
        }
    };
}

/// Assert that a node failed.
#[macro_export]
macro_rules! assert_failed {
    ($d:expr) => {
        assert!(
            $d.is_failed(),
            "expected a failed node, got {}",
            $d.state().name()
        );
    };
}

/// Assert that a node was aborted.
#[macro_export]
macro_rules! assert_aborted {
    ($d:expr) => {
        assert!(
            $d.is_aborted(),
            "expected an aborted node, got {}",
            $d.state().name()
        );
    };
}
