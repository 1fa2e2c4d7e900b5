//! First-wins combinator: the first input to resolve decides.
//!
//! `first_of(inputs)` yields a node that:
//!
//! 1. succeeds with the first input's full result tuple, then aborts every
//!    other input (losers that already resolved are skipped silently);
//! 2. fails with the first input failure when nothing has succeeded;
//!    later failures are suppressed;
//! 3. stays idempotent after resolution: further input completions have no
//!    observable effect beyond the loser aborts.
//!
//! Each input is observed through an attached continuation plus a local
//! failure handler, so a loser that fails after the race is decided is
//! absorbed inside its own tree instead of surfacing a spurious
//! unhandled-failure diagnostic.

use crate::node::{Deferred, Emit};
use std::cell::Cell;
use std::rc::Rc;

/// Resolves with the first input to resolve and aborts the rest.
///
/// # Panics
///
/// Panics on an empty input slice; the winner node inherits its scheduler
/// from the first input.
#[must_use]
pub fn first_of(inputs: &[Deferred]) -> Deferred {
    assert!(!inputs.is_empty(), "first_of requires at least one input");
    let winner = Deferred::new(inputs[0].scheduler());
    let settled = Rc::new(Cell::new(false));
    let peers: Rc<[Deferred]> = inputs.into();

    for (index, input) in inputs.iter().enumerate() {
        let st = settled.clone();
        let w = winner.clone();
        let others = peers.clone();
        let child = input.then(move |values| {
            if !st.get() {
                st.set(true);
                let _ = w.succeed(values.to_vec());
                abort_losers(&others, index);
            }
            Ok(Emit::nothing())
        });

        let st = settled.clone();
        let w = winner.clone();
        let others = peers.clone();
        child.or_if_error(move |failure| {
            if !st.get() {
                st.set(true);
                w.fail_with(failure.clone());
                abort_losers(&others, index);
            }
        });
    }

    winner
}

fn abort_losers(inputs: &[Deferred], winner: usize) {
    for (index, input) in inputs.iter().enumerate() {
        if index != winner && input.is_pending() {
            input.abort(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::TickLoop;
    use crate::types::state::NodeState;
    use crate::types::value::get;

    fn inputs(lp: &TickLoop, n: usize) -> Vec<Deferred> {
        (0..n).map(|_| Deferred::new(lp.handle())).collect()
    }

    #[test]
    fn first_success_wins_and_losers_abort() {
        let lp = TickLoop::new();
        let ins = inputs(&lp, 3);
        let w = first_of(&ins);
        let aborted = Rc::new(Cell::new(0));
        for input in &ins {
            let a = aborted.clone();
            input.on_abort(move |_| a.set(a.get() + 1));
        }
        ins[1].succeed(("ok",)).unwrap();
        lp.run_until_quiescent();
        match w.state() {
            NodeState::Succeeded(values) => assert_eq!(get::<&str>(&values, 0), Some(&"ok")),
            other => unreachable!("expected success, got {other:?}"),
        }
        assert!(ins[0].is_aborted());
        assert!(ins[1].is_succeeded());
        assert!(ins[2].is_aborted());
        assert_eq!(aborted.get(), 2);
    }

    #[test]
    fn first_failure_wins_when_nothing_succeeded() {
        let lp = TickLoop::new();
        let ins = inputs(&lp, 2);
        let w = first_of(&ins);
        let seen = Rc::new(Cell::new(false));
        let seen2 = seen.clone();
        w.or_if_error(move |failure| {
            assert_eq!(failure.downcast_ref::<&str>(), Some(&"first"));
            seen2.set(true);
        });
        ins[0].fail("first");
        lp.run_until_quiescent();
        assert!(seen.get());
        assert!(w.is_failed());
    }

    #[test]
    fn late_completions_have_no_further_effect() {
        let lp = TickLoop::new();
        let ins = inputs(&lp, 2);
        let w = first_of(&ins);
        // Both resolve before the loop turns; the race still has exactly
        // one winner and the loser's completion is swallowed.
        ins[0].succeed((1i32,)).unwrap();
        ins[1].succeed((2i32,)).unwrap();
        lp.run_until_quiescent();
        match w.state() {
            NodeState::Succeeded(values) => assert_eq!(get::<i32>(&values, 0), Some(&1)),
            other => unreachable!("expected success, got {other:?}"),
        }
        assert!(ins[1].is_succeeded());
    }

    #[test]
    fn loser_failure_after_resolution_stays_silent() {
        let lp = TickLoop::new();
        let ins = inputs(&lp, 2);
        let w = first_of(&ins);
        ins[0].succeed((1i32,)).unwrap();
        lp.run_until_quiescent();
        assert!(w.is_succeeded());
        // The loser was aborted; failing it now is a no-op inside its own
        // tree and nothing reaches a fallback handler.
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        crate::handler::set_default_error_handler(move |_| h.set(true));
        ins[1].fail("late");
        lp.run_until_quiescent();
        crate::handler::clear_default_error_handler();
        assert!(!hit.get());
    }

    #[test]
    #[should_panic(expected = "at least one input")]
    fn empty_input_is_refused() {
        let _ = first_of(&[]);
    }
}
