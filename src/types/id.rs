//! Identifier types for chain nodes.
//!
//! Ids exist for diagnostics and failure attribution, not for lookup: a
//! warning about a misused node and the fatal report about an unhandled
//! failure both name nodes by id, and a failure thrown from a success
//! callback carries a [`CallbackOrigin`] naming the callback that raised it.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NODE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A unique identifier for a node in a deferred chain.
///
/// Ids are ephemeral: allocated from a process-wide counter, unique for the
/// lifetime of the process, and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocates the next ephemeral id.
    pub(crate) fn next() -> Self {
        Self(NODE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifies the success callback that raised a failure.
///
/// A callback is addressed by the node it was registered on and its
/// registration index; index `i` is the callback feeding that node's
/// `i`-th child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackOrigin {
    /// The node the callback was registered on.
    pub node: NodeId,
    /// The callback's registration index on that node.
    pub index: usize,
}

impl fmt::Display for CallbackOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback #{} of {}", self.index, self.node)
    }
}
