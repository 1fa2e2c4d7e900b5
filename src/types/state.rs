//! The four-valued node state.
//!
//! Every node is `Pending` until its producer resolves it, and afterwards
//! sits in exactly one of three terminal states:
//!
//! - `Succeeded(values)`: the producer (or the feeding callback) delivered a
//!   result tuple
//! - `Failed(failure)`: the producer failed it, or its feeding callback
//!   raised
//! - `Aborted(args)`: cancellation reached it, directly or from an ancestor
//!
//! Terminal states are mutually exclusive and entered at most once; every
//! mutating operation on a node is guarded by a match on this variant.

use crate::error::Failure;
use crate::types::value::Value;
use core::fmt;

/// The state of a chain node.
#[derive(Clone)]
pub enum NodeState {
    /// Not yet resolved.
    Pending,
    /// Resolved with a result tuple.
    Succeeded(Vec<Value>),
    /// Resolved with a failure.
    Failed(Failure),
    /// Cancelled with the abort arguments.
    Aborted(Vec<Value>),
}

impl NodeState {
    /// Returns true while the node is unresolved.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns true if the node resolved with a result.
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Returns true if the node resolved with a failure.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if the node was aborted.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Returns true in any of the three terminal states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// Short state name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::Aborted(_) => "aborted",
        }
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Succeeded(values) => write!(f, "Succeeded({} values)", values.len()),
            Self::Failed(failure) => write!(f, "Failed({failure})"),
            Self::Aborted(args) => write!(f, "Aborted({} args)", args.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::value::val;

    #[test]
    fn predicates_match_variants() {
        assert!(NodeState::Pending.is_pending());
        assert!(!NodeState::Pending.is_terminal());

        let ok = NodeState::Succeeded(vec![val(1)]);
        assert!(ok.is_succeeded());
        assert!(ok.is_terminal());

        let failed = NodeState::Failed(Failure::unspecified());
        assert!(failed.is_failed());
        assert!(failed.is_terminal());

        let aborted = NodeState::Aborted(Vec::new());
        assert!(aborted.is_aborted());
        assert!(aborted.is_terminal());
    }

    #[test]
    fn names_are_stable() {
        assert_eq!(NodeState::Pending.name(), "pending");
        assert_eq!(NodeState::Aborted(Vec::new()).name(), "aborted");
    }
}
