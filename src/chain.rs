//! The chain-tree engine: linking, delivery, error bubbling, splicing.
//!
//! # Tree shape
//!
//! `then` appends a `(callback, child)` pair to the parent. The first child
//! continues the parent's branch; any later child starts its own. On the
//! 1→2 transition the parent becomes a branch point and the first child's
//! maximal single-successor chain is re-headed to the first child, so that
//! `abort_branch` from anywhere inside a chain aborts exactly that chain
//! and its subtree, never its siblings.
//!
//! Canonical invariant: after every `then`, a child's branch head equals
//! itself iff its parent has two or more children, and otherwise equals the
//! parent's branch head.
//!
//! # Delivery
//!
//! Terminal delivery runs one tick after the external resolution call.
//! Within a delivery step everything is synchronous: children in insertion
//! order, listeners in registration order, and a child resolved by its
//! feeding callback delivers onward in the same step. Registration slots
//! are consumed exactly once (`Option::take`), which makes the pairing of
//! "the pending delivery step covers everything registered so far" with
//! "late registrations schedule their own delivery" idempotent.
//!
//! # Failure walk
//!
//! A failing node runs its local handlers; with none registered, every
//! non-aborted child and splice target receives the same failure,
//! recursively. The walk reports handled only when every branch reported
//! handled; the walk root then falls back to the process-wide handler and,
//! failing that, emits a fatal diagnostic and re-raises.

use crate::error::Failure;
use crate::handler;
use crate::node::{Callback, Deferred, Emit, Errback, Splice};
use crate::types::id::CallbackOrigin;
use crate::types::state::NodeState;
use crate::types::value::Value;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::rc::Rc;

enum Late {
    Success(usize),
    Failure(Failure),
    Abort(Vec<Value>),
}

/// Links a new child under `parent` and returns it.
pub(crate) fn then(parent: &Deferred, callback: Callback) -> Deferred {
    let child = Deferred::new(parent.scheduler());
    let (rearrange_from, late) = {
        let mut p = parent.node.borrow_mut();
        {
            let mut c = child.node.borrow_mut();
            c.root = match &p.root {
                Some(w) => Some(w.clone()),
                None => Some(Rc::downgrade(&parent.node)),
            };
            if p.children.is_empty() {
                c.branch = match &p.branch {
                    Some(w) => Some(w.clone()),
                    None => Some(Rc::downgrade(&parent.node)),
                };
            } else {
                c.branch = Some(Rc::downgrade(&child.node));
            }
        }
        let rearrange_from = if p.children.len() == 1 {
            Some(p.children[0].clone())
        } else {
            None
        };
        let index = p.children.len();
        p.children.push(child.clone());
        p.callbacks.push(Some(callback));
        let late = if p.delivered {
            match &p.state {
                NodeState::Succeeded(_) => Some(Late::Success(index)),
                NodeState::Failed(f) => Some(Late::Failure(f.clone())),
                NodeState::Aborted(args) => Some(Late::Abort(args.clone())),
                NodeState::Pending => None,
            }
        } else {
            None
        };
        (rearrange_from, late)
    };
    if let Some(first_child) = rearrange_from {
        rearrange_branch(&first_child);
    }
    if let Some(late) = late {
        let sched = parent.scheduler();
        match late {
            Late::Success(index) => {
                let p = parent.clone();
                sched.defer(Box::new(move || deliver_one(&p, index)));
            }
            Late::Failure(failure) => {
                let c = child.clone();
                sched.defer(Box::new(move || fail_into(&c, failure)));
            }
            Late::Abort(args) => {
                let c = child.clone();
                sched.defer(Box::new(move || abort_into(&c, &args)));
            }
        }
    }
    child
}

/// Re-heads the maximal single-successor chain starting at `first_child`
/// after its parent became a branch point.
fn rearrange_branch(first_child: &Deferred) {
    let head = Rc::downgrade(&first_child.node);
    let mut cur = first_child.node.clone();
    loop {
        let next = {
            let mut n = cur.borrow_mut();
            if n.state.is_pending() {
                n.branch = Some(head.clone());
            }
            if n.children.len() == 1 {
                Some(n.children[0].node.clone())
            } else {
                None
            }
        };
        match next {
            Some(c) => cur = c,
            None => break,
        }
    }
}

// ---------------- success delivery ----------------

/// Runs the scheduled success delivery step for `d`.
pub(crate) fn deliver_success(d: &Deferred) {
    let (values, count) = {
        let mut n = d.node.borrow_mut();
        let values = match &n.state {
            NodeState::Succeeded(v) => v.clone(),
            _ => return,
        };
        if n.delivered {
            return;
        }
        n.delivered = true;
        (values, n.children.len())
    };
    fire_finally(d);
    for index in 0..count {
        let step = {
            let mut n = d.node.borrow_mut();
            let child = n.children[index].clone();
            if child.is_aborted() {
                n.callbacks[index] = None;
                None
            } else {
                n.callbacks[index].take().map(|cb| (cb, child))
            }
        };
        if let Some((callback, child)) = step {
            run_callback(d, index, callback, &values, &child);
        }
    }
    let targets = std::mem::take(&mut d.node.borrow_mut().splices);
    for splice in targets {
        succeed_into(&splice.target, values.clone());
    }
}

/// Runs one late-attached success continuation.
pub(crate) fn deliver_one(d: &Deferred, index: usize) {
    let step = {
        let mut n = d.node.borrow_mut();
        let values = match &n.state {
            NodeState::Succeeded(v) => v.clone(),
            _ => return,
        };
        if index >= n.children.len() {
            return;
        }
        let child = n.children[index].clone();
        if child.is_aborted() {
            n.callbacks[index] = None;
            None
        } else {
            n.callbacks[index].take().map(|cb| (cb, child, values))
        }
    };
    if let Some((callback, child, values)) = step {
        run_callback(d, index, callback, &values, &child);
    }
}

fn run_callback(
    parent: &Deferred,
    index: usize,
    callback: Callback,
    values: &[Value],
    child: &Deferred,
) {
    let origin = CallbackOrigin {
        node: parent.id(),
        index,
    };
    match callback(values) {
        Ok(Emit::Value(v)) => succeed_into(child, vec![v]),
        Ok(Emit::Values(vs)) => succeed_into(child, vs),
        Ok(Emit::Deferred(inner)) => splice(&inner, child, origin),
        Err(v) => fail_into(child, Failure::thrown(v, origin)),
    }
}

/// Feeds a result into `d` and delivers onward in the same step.
pub(crate) fn succeed_into(d: &Deferred, values: Vec<Value>) {
    {
        let mut n = d.node.borrow_mut();
        match &n.state {
            NodeState::Pending => {
                n.state = NodeState::Succeeded(values);
                n.clear_back_edges();
            }
            _ => return,
        }
    }
    deliver_success(d);
}

// ---------------- failure delivery ----------------

/// Walk-root failure entry: delivers the failure and applies the
/// unhandled policy.
pub(crate) fn fail_into(d: &Deferred, failure: Failure) {
    let handled = deliver_failure(d, &failure);
    if !handled {
        unhandled(d, &failure);
    }
}

/// Runs the scheduled failure walk for an externally failed node.
pub(crate) fn deliver_failure_root(d: &Deferred) {
    let failure = {
        let n = d.node.borrow();
        match &n.state {
            NodeState::Failed(f) => f.clone(),
            _ => return,
        }
    };
    let handled = deliver_failure(d, &failure);
    if !handled {
        unhandled(d, &failure);
    }
}

/// Depth-first, left-to-right failure walk. Returns true when every branch
/// below (and including) `d` absorbed the failure.
fn deliver_failure(d: &Deferred, failure: &Failure) -> bool {
    let effective = {
        let mut n = d.node.borrow_mut();
        let effective = match &n.state {
            NodeState::Pending => {
                n.state = NodeState::Failed(failure.clone());
                n.clear_back_edges();
                failure.clone()
            }
            NodeState::Failed(f) => f.clone(),
            NodeState::Succeeded(_) | NodeState::Aborted(_) => return true,
        };
        if n.delivered {
            return true;
        }
        n.delivered = true;
        effective
    };
    fire_finally(d);
    let handlers: Vec<Errback> = {
        let mut n = d.node.borrow_mut();
        n.errbacks.iter_mut().filter_map(Option::take).collect()
    };
    if !handlers.is_empty() {
        for handler in handlers {
            invoke_errback(handler, &effective);
        }
        return true;
    }
    let targets: Vec<(Deferred, Option<CallbackOrigin>)> = {
        let n = d.node.borrow();
        n.children
            .iter()
            .map(|c| (c.clone(), None))
            .chain(n.splices.iter().map(|s| (s.target.clone(), Some(s.origin))))
            .filter(|(t, _)| !t.is_aborted())
            .collect()
    };
    if targets.is_empty() {
        return false;
    }
    let mut handled = true;
    for (target, origin) in targets {
        let forwarded = match origin {
            Some(origin) => effective.clone().with_origin(origin),
            None => effective.clone(),
        };
        handled &= deliver_failure(&target, &forwarded);
    }
    handled
}

/// Runs one handler registered after the node already failed.
pub(crate) fn run_late_errback(d: &Deferred, index: usize) {
    let step = {
        let mut n = d.node.borrow_mut();
        let failure = match &n.state {
            NodeState::Failed(f) => f.clone(),
            _ => return,
        };
        n.errbacks
            .get_mut(index)
            .and_then(Option::take)
            .map(|h| (h, failure))
    };
    if let Some((handler, failure)) = step {
        invoke_errback(handler, &failure);
    }
}

fn invoke_errback(handler: Errback, failure: &Failure) {
    match catch_unwind(AssertUnwindSafe(|| handler(failure))) {
        Ok(()) => {}
        Err(payload) => {
            tracing::error!(failure = %failure, "failure handler panicked");
            resume_unwind(payload);
        }
    }
}

fn unhandled(d: &Deferred, failure: &Failure) {
    if handler::invoke_default(failure) {
        return;
    }
    match failure.origin() {
        Some(origin) => tracing::error!(
            node = %d.id(),
            %origin,
            failure = %failure,
            "unhandled failure with no fallback handler"
        ),
        None => tracing::error!(
            node = %d.id(),
            failure = %failure,
            "unhandled failure with no fallback handler"
        ),
    }
    panic!("unhandled failure in deferred chain: {failure}");
}

/// Fires the finally hook, at most once.
pub(crate) fn fire_finally(d: &Deferred) {
    let hook = d.node.borrow_mut().finally_hook.take();
    if let Some(hook) = hook {
        hook();
    }
}

// ---------------- splice ----------------

enum SpliceAction {
    None,
    Feed(Vec<Value>),
    Fail(Failure),
}

/// Wires `child` to resolve from `inner`, the deferred a success callback
/// returned.
///
/// A still-undelivered `inner` covers the target in its own delivery step;
/// an already-delivered success feeds the child here; an already-delivered
/// failure reaches the child only when `inner` never had local handlers
/// (an inner that advertises handling absorbs its errors); an aborted
/// `inner` leaves the child pending.
pub(crate) fn splice(inner: &Deferred, child: &Deferred, origin: CallbackOrigin) {
    let action = {
        let mut n = inner.node.borrow_mut();
        if n.delivered {
            match &n.state {
                NodeState::Succeeded(values) => SpliceAction::Feed(values.clone()),
                NodeState::Failed(f) => {
                    if n.errbacks.is_empty() {
                        SpliceAction::Fail(f.clone().with_origin(origin))
                    } else {
                        SpliceAction::None
                    }
                }
                NodeState::Pending | NodeState::Aborted(_) => SpliceAction::None,
            }
        } else if n.state.is_aborted() {
            SpliceAction::None
        } else {
            n.splices.push(Splice {
                target: child.clone(),
                origin,
            });
            SpliceAction::None
        }
    };
    match action {
        SpliceAction::Feed(values) => succeed_into(child, values),
        SpliceAction::Fail(failure) => fail_into(child, failure),
        SpliceAction::None => {}
    }
}

// ---------------- abort delivery ----------------

/// Runs the scheduled abort propagation step for `d`.
pub(crate) fn deliver_abort(d: &Deferred) {
    let (args, children) = {
        let mut n = d.node.borrow_mut();
        let args = match &n.state {
            NodeState::Aborted(a) => a.clone(),
            _ => return,
        };
        if n.delivered {
            return;
        }
        n.delivered = true;
        (args, n.children.clone())
    };
    for child in children {
        abort_into(&child, &args);
    }
}

/// Recursively aborts a subtree, synchronously; terminal nodes are skipped
/// without a warning.
pub(crate) fn abort_into(d: &Deferred, args: &[Value]) {
    let listeners = {
        let mut n = d.node.borrow_mut();
        if n.state.is_terminal() {
            return;
        }
        n.state = NodeState::Aborted(args.to_vec());
        n.clear_back_edges();
        n.delivered = true;
        std::mem::take(&mut n.abort_listeners)
    };
    for listener in listeners {
        listener(args);
    }
    let children = {
        let n = d.node.borrow();
        n.children.clone()
    };
    for child in children {
        abort_into(&child, args);
    }
}
