//! Dynamic values flowing through a chain.
//!
//! Results, failures, and abort arguments are opaque to the chain machinery:
//! a producer may succeed a node with any tuple of values, and a callback
//! receives that tuple positionally. Values are reference-counted and
//! single-threaded, like the nodes that carry them.

use std::any::Any;
use std::rc::Rc;

/// A dynamically typed value carried by results, failures, and abort
/// arguments.
pub type Value = Rc<dyn Any>;

/// Boxes a single concrete value.
#[must_use]
pub fn val<T: 'static>(v: T) -> Value {
    Rc::new(v)
}

/// Borrows one slot of a result tuple as a concrete type.
///
/// Returns `None` when the slot is missing or holds a different type.
#[must_use]
pub fn get<T: 'static>(values: &[Value], index: usize) -> Option<&T> {
    values.get(index).and_then(|v| v.downcast_ref::<T>())
}

/// Conversion into a result tuple.
///
/// `succeed` and `abort` accept anything implementing this; tuples spread
/// into positional slots, which is the Rust rendering of the variadic
/// producer arguments. Pass a `Vec<Value>` for values that are already
/// boxed (tuple elements are boxed by the conversion, so a `Value` inside a
/// tuple would end up double-boxed).
pub trait IntoValues {
    /// Converts self into the positional value list.
    fn into_values(self) -> Vec<Value>;
}

impl IntoValues for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

impl IntoValues for Vec<Value> {
    fn into_values(self) -> Vec<Value> {
        self
    }
}

impl<A: 'static> IntoValues for (A,) {
    fn into_values(self) -> Vec<Value> {
        vec![val(self.0)]
    }
}

impl<A: 'static, B: 'static> IntoValues for (A, B) {
    fn into_values(self) -> Vec<Value> {
        vec![val(self.0), val(self.1)]
    }
}

impl<A: 'static, B: 'static, C: 'static> IntoValues for (A, B, C) {
    fn into_values(self) -> Vec<Value> {
        vec![val(self.0), val(self.1), val(self.2)]
    }
}

impl<A: 'static, B: 'static, C: 'static, D: 'static> IntoValues for (A, B, C, D) {
    fn into_values(self) -> Vec<Value> {
        vec![val(self.0), val(self.1), val(self.2), val(self.3)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuples_spread_into_positional_slots() {
        let values = (1i32, "two", 3.0f64).into_values();
        assert_eq!(values.len(), 3);
        assert_eq!(get::<i32>(&values, 0), Some(&1));
        assert_eq!(get::<&str>(&values, 1), Some(&"two"));
        assert_eq!(get::<f64>(&values, 2), Some(&3.0));
    }

    #[test]
    fn unit_is_the_empty_tuple() {
        assert!(().into_values().is_empty());
    }

    #[test]
    fn get_rejects_wrong_type_and_index() {
        let values = (5i32,).into_values();
        assert_eq!(get::<u8>(&values, 0), None);
        assert_eq!(get::<i32>(&values, 1), None);
    }

    #[test]
    fn prebuilt_vec_passes_through() {
        let values = vec![val(9i32)].into_values();
        assert_eq!(get::<i32>(&values, 0), Some(&9));
    }
}
