//! Core types: identifiers, the node state variant, and dynamic values.

pub mod id;
pub mod state;
pub mod value;

pub use id::{CallbackOrigin, NodeId};
pub use state::NodeState;
pub use value::{get, val, IntoValues, Value};
