//! Fan-in combinators over multiple deferreds.
//!
//! Two shapes, differing in what happens to the inputs that did not decide
//! the outcome:
//!
//! - [`all_of`] waits for **every** input and never touches them; the first
//!   input failure decides the join, but siblings keep running.
//! - [`first_of`] takes the **first** input to resolve and aborts the rest.
//!
//! Both observe their inputs through an attached continuation plus a local
//! failure handler, so an input failure is always absorbed inside the
//! input's own tree and never surfaces as an unhandled-failure diagnostic.

pub mod all;
pub mod first;

pub use all::all_of;
pub use first::first_of;
