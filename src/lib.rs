//! Deferred: single-resolution asynchronous values with chained dependents.
//!
//! # Overview
//!
//! A [`Deferred`] is a user-space asynchronous value: a producer resolves it
//! exactly once (success, failure, or abort), and any number of dependents
//! observe the resolution, attached before or after it happened. Dependents
//! form a tree rooted at the original node; each `then` continuation sprouts
//! a child that can itself sprout children, so a chain of computations is a
//! branch of that tree.
//!
//! # Core Guarantees
//!
//! - **Single resolution**: a node enters at most one terminal state, once.
//!   Double resolution is either a typed error or a structured warning,
//!   never silent corruption.
//! - **Late attachment is equivalent to early attachment**: a continuation
//!   registered after resolution observes the same values as one registered
//!   before, after one tick of the host loop.
//! - **Errors must land somewhere**: a failure walks every branch below the
//!   failing node until a handler absorbs it; a branch with no handler falls
//!   through to the fallback handler, and without one the failure is fatal
//!   with a diagnostic naming the faulty callback.
//! - **Abort is scoped and terminal**: [`Deferred::abort`] cancels a subtree,
//!   [`Deferred::abort_branch`] cancels exactly the surrounding
//!   single-successor chain, [`Deferred::abort_all`] cancels from the root.
//!   Work already running completes; work not yet started is skipped.
//! - **No ambient authority**: every node carries an explicit [`Schedule`]
//!   capability for its "run after the current stack unwinds" steps; there
//!   is no hidden global loop.
//!
//! # Module Structure
//!
//! - [`types`]: core types (ids, the node state variant, dynamic values)
//! - [`error`]: user failures and misuse errors
//! - [`sched`]: the host scheduling contract and the deterministic tick loop
//! - [`node`]: the `Deferred` handle and its state machine
//! - [`combinator`]: the all-join and first-wins fan-in combinators
//! - [`handler`]: the fallback error handler slot
//! - [`test_utils`]: logging init and assertion helpers shared by tests
//!
//! # Example
//!
//! ```
//! use deferred::{val, get, Deferred, Emit, TickLoop};
//!
//! let lp = TickLoop::new();
//! let d = Deferred::new(lp.handle());
//! let doubled = d.then(|vals| {
//!     let x = *get::<i32>(vals, 0).unwrap();
//!     Ok(Emit::Value(val(x * 2)))
//! });
//! d.succeed((21,)).unwrap();
//! lp.run_until_quiescent();
//! assert!(doubled.is_succeeded());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

pub mod combinator;
pub mod error;
pub mod handler;
pub mod node;
pub mod sched;
pub mod test_utils;
pub mod types;

mod chain;

// Re-exports for convenient access to core types
pub use combinator::{all_of, first_of};
pub use error::{Failure, MisuseError};
pub use handler::{clear_default_error_handler, set_default_error_handler};
pub use node::{throw, CallbackResult, Deferred, Emit};
pub use sched::{Schedule, Thunk, TickLoop};
pub use types::id::{CallbackOrigin, NodeId};
pub use types::state::NodeState;
pub use types::value::{get, val, IntoValues, Value};
