//! Failure values and misuse errors.
//!
//! Two error families with different audiences:
//!
//! - [`Failure`] is the *user* error: the opaque value a producer passes to
//!   `fail`, or the value a success callback raises. It travels down the
//!   chain until a handler absorbs it.
//! - [`MisuseError`] is the *caller* error: a contract violation on the node
//!   API itself. Only the violations the contract makes hard errors live
//!   here; the rest are structured warnings.

use crate::types::id::CallbackOrigin;
use crate::types::value::{val, Value};
use core::fmt;

/// Message recorded when a producer fails a node without an error value.
pub const UNSPECIFIED_FAILURE: &str = "errback called without error";

/// An opaque user failure traveling down a chain.
///
/// Carries the failure value and, when the failure was raised by a success
/// callback rather than a producer, the identity of that callback.
/// Cloning is cheap; the value is reference-counted.
#[derive(Clone)]
pub struct Failure {
    value: Value,
    origin: Option<CallbackOrigin>,
}

impl Failure {
    /// Wraps a failure value supplied by a producer.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            origin: None,
        }
    }

    /// The sentinel failure used when the producer supplied no error value.
    #[must_use]
    pub fn unspecified() -> Self {
        Self::new(val(UNSPECIFIED_FAILURE))
    }

    /// Wraps a value raised by the identified success callback.
    pub(crate) fn thrown(value: Value, origin: CallbackOrigin) -> Self {
        Self {
            value,
            origin: Some(origin),
        }
    }

    /// Attributes this failure to `origin` unless it already carries one.
    pub(crate) fn with_origin(mut self, origin: CallbackOrigin) -> Self {
        if self.origin.is_none() {
            self.origin = Some(origin);
        }
        self
    }

    /// Returns the failure value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the identity of the callback that raised this failure, when
    /// known.
    #[must_use]
    pub const fn origin(&self) -> Option<CallbackOrigin> {
        self.origin
    }

    /// Borrows the failure value as a concrete type.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(msg) = self.downcast_ref::<&str>() {
            write!(f, "{msg}")?;
        } else if let Some(msg) = self.downcast_ref::<String>() {
            write!(f, "{msg}")?;
        } else {
            write!(f, "<opaque failure value>")?;
        }
        if let Some(origin) = self.origin {
            write!(f, " (raised by {origin})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failure({self})")
    }
}

/// Contract violations reported to the caller as hard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MisuseError {
    /// A node that already delivered a success was resolved again.
    #[error("deferred already resolved")]
    AlreadyResolved,
    /// A second finally hook was registered on the same node.
    #[error("finally hook already set")]
    FinallyAlreadySet,
}
