//! The fallback failure handler.
//!
//! One per-thread slot, consulted only when a failure walk reports that no
//! branch below the failing node carried a handler. Chains are
//! single-threaded (`Rc`-based), so the slot is thread-local; `set` replaces
//! any previous handler and [`clear_default_error_handler`] exists for test
//! isolation.

use crate::error::Failure;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

type FallbackHandler = Rc<dyn Fn(&Failure)>;

thread_local! {
    static FALLBACK: RefCell<Option<FallbackHandler>> = const { RefCell::new(None) };
}

/// Installs the fallback handler, replacing any previous one.
pub fn set_default_error_handler<F>(f: F)
where
    F: Fn(&Failure) + 'static,
{
    FALLBACK.with(|slot| *slot.borrow_mut() = Some(Rc::new(f)));
}

/// Removes the fallback handler.
pub fn clear_default_error_handler() {
    FALLBACK.with(|slot| *slot.borrow_mut() = None);
}

/// Hands `failure` to the fallback handler, if one is installed.
///
/// Returns true only when a handler existed and ran to completion. A
/// panicking handler is caught and diagnosed, and the failure is reported
/// as still unhandled so the caller proceeds down the fatal path.
pub(crate) fn invoke_default(failure: &Failure) -> bool {
    let Some(handler) = FALLBACK.with(|slot| slot.borrow().clone()) else {
        return false;
    };
    match catch_unwind(AssertUnwindSafe(|| handler(failure))) {
        Ok(()) => true,
        Err(_) => {
            tracing::error!(failure = %failure, "fallback failure handler panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::value::val;
    use std::cell::Cell;

    #[test]
    fn invoke_without_handler_reports_unhandled() {
        clear_default_error_handler();
        assert!(!invoke_default(&Failure::unspecified()));
    }

    #[test]
    fn installed_handler_receives_the_failure() {
        let seen = Rc::new(Cell::new(false));
        let seen2 = seen.clone();
        set_default_error_handler(move |failure| {
            assert_eq!(failure.downcast_ref::<&str>(), Some(&"boom"));
            seen2.set(true);
        });
        assert!(invoke_default(&Failure::new(val("boom"))));
        assert!(seen.get());
        clear_default_error_handler();
    }

    #[test]
    fn panicking_handler_counts_as_unhandled() {
        set_default_error_handler(|_| panic!("handler bug"));
        assert!(!invoke_default(&Failure::unspecified()));
        clear_default_error_handler();
    }
}
