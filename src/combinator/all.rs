//! All-join combinator: wait for every input.
//!
//! `all_of(inputs)` yields a join node that:
//!
//! 1. succeeds with one positional value per input — each input's first
//!    result value, in input order — once every input has succeeded;
//! 2. fails with the first input failure; every later input event is
//!    ignored;
//! 3. broadcasts a partial result after each input success: the aggregate
//!    `Vec<Option<Value>>`, where slot `i` is filled iff input `i` has
//!    completed;
//! 4. broadcasts `progress(k, n)` after the k-th success.
//!
//! Inputs are never aborted by the join; a sibling failure fails the join
//! and leaves the remaining inputs running. That is the deliberate contrast
//! with [`first_of`](crate::combinator::first_of).

use crate::node::{Deferred, Emit};
use crate::types::value::{val, Value};
use std::cell::RefCell;
use std::rc::Rc;

struct JoinState {
    slots: Vec<Option<Value>>,
    completed: usize,
    settled: bool,
}

/// Joins the inputs into one deferred that resolves when all of them have
/// succeeded, or as soon as one of them fails.
///
/// # Panics
///
/// Panics on an empty input slice; the join inherits its scheduler from the
/// first input.
#[must_use]
pub fn all_of(inputs: &[Deferred]) -> Deferred {
    assert!(!inputs.is_empty(), "all_of requires at least one input");
    let join = Deferred::new(inputs[0].scheduler());
    let total = inputs.len();
    let state = Rc::new(RefCell::new(JoinState {
        slots: vec![None; total],
        completed: 0,
        settled: false,
    }));

    for (index, input) in inputs.iter().enumerate() {
        let st = state.clone();
        let j = join.clone();
        let child = input.then(move |values| {
            let update = {
                let mut s = st.borrow_mut();
                if s.settled || s.slots[index].is_some() {
                    None
                } else {
                    s.slots[index] = Some(values.first().cloned().unwrap_or_else(|| val(())));
                    s.completed += 1;
                    let aggregate = s.slots.clone();
                    let completed = s.completed;
                    let finished = if completed == total {
                        s.settled = true;
                        Some(
                            s.slots
                                .iter_mut()
                                .map(|slot| slot.take().unwrap_or_else(|| val(())))
                                .collect::<Vec<_>>(),
                        )
                    } else {
                        None
                    };
                    Some((aggregate, completed, finished))
                }
            };
            if let Some((aggregate, completed, finished)) = update {
                j.partial_result_value(Rc::new(aggregate));
                j.progress(completed, total);
                if let Some(values) = finished {
                    let _ = j.succeed(values);
                }
            }
            Ok(Emit::nothing())
        });

        let st = state.clone();
        let j = join.clone();
        child.or_if_error(move |failure| {
            let first = {
                let mut s = st.borrow_mut();
                if s.settled {
                    false
                } else {
                    s.settled = true;
                    true
                }
            };
            if first {
                j.fail_with(failure.clone());
            }
        });
    }

    join
}
