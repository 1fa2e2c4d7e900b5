//! The deferred node: handle, state machine, and listener registration.
//!
//! A [`Deferred`] is a cheap clone handle onto one node of a chain tree.
//! The node owns its state variant, its registered continuations and
//! listeners, forward links to its children, and weak back-edges to the
//! tree root and to the head of its branch. Back-edges exist only to give
//! [`Deferred::abort_all`] and [`Deferred::abort_branch`] their scope and
//! are cleared on every terminal transition, so a settled tree is
//! reclaimable forward-only.
//!
//! External resolution (`succeed`, `fail`, `abort`) records state
//! synchronously and schedules delivery one tick later, which is what lets
//! a producer hand out an already-resolved node and still give the consumer
//! a chance to attach continuations first. Inside one delivery step,
//! execution is synchronous: children in insertion order, listeners in
//! registration order.

use crate::chain;
use crate::error::{Failure, MisuseError};
use crate::sched::Schedule;
use crate::types::id::NodeId;
use crate::types::state::NodeState;
use crate::types::value::{val, IntoValues, Value};
use core::fmt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub(crate) type Callback = Box<dyn FnOnce(&[Value]) -> CallbackResult>;
pub(crate) type Errback = Box<dyn FnOnce(&Failure)>;
pub(crate) type AbortListener = Box<dyn FnOnce(&[Value])>;
pub(crate) type ProgressListener = Box<dyn FnMut(usize, usize)>;
pub(crate) type PartialListener = Box<dyn FnMut(&Value)>;
pub(crate) type FinallyHook = Box<dyn FnOnce()>;

/// What a success callback hands to its next link.
pub enum Emit {
    /// A single value; becomes the child's one-slot result tuple.
    Value(Value),
    /// A full result tuple.
    Values(Vec<Value>),
    /// Splice: the child resolves when this inner deferred does.
    Deferred(Deferred),
}

impl Emit {
    /// Boxes a single concrete value.
    #[must_use]
    pub fn value<T: 'static>(v: T) -> Self {
        Self::Value(val(v))
    }

    /// The empty result tuple.
    #[must_use]
    pub const fn nothing() -> Self {
        Self::Values(Vec::new())
    }
}

/// Result of a success callback; the `Err` arm raises a failure into the
/// callback's next link.
pub type CallbackResult = Result<Emit, Value>;

/// Raises `v` as a failure from inside a success callback.
pub fn throw<T: 'static>(v: T) -> CallbackResult {
    Err(val(v))
}

/// A splice registration on an inner deferred: the outer child to feed,
/// plus the identity of the callback that returned the inner deferred (used
/// to attribute a forwarded failure).
pub(crate) struct Splice {
    pub(crate) target: Deferred,
    pub(crate) origin: crate::types::id::CallbackOrigin,
}

pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) state: NodeState,
    /// Success continuations; entry `i` feeds `children[i]` and is consumed
    /// exactly once.
    pub(crate) callbacks: Vec<Option<Callback>>,
    pub(crate) children: Vec<Deferred>,
    pub(crate) errbacks: Vec<Option<Errback>>,
    pub(crate) abort_listeners: Vec<AbortListener>,
    pub(crate) progress_listeners: Vec<ProgressListener>,
    pub(crate) partial_listeners: Vec<PartialListener>,
    pub(crate) finally_hook: Option<FinallyHook>,
    pub(crate) finally_set: bool,
    /// Outer children awaiting this node as a spliced inner deferred. Kept
    /// apart from `children`: splice targets belong to another tree and do
    /// not participate in branch shape or abort propagation here.
    pub(crate) splices: Vec<Splice>,
    pub(crate) root: Option<Weak<RefCell<Node>>>,
    pub(crate) branch: Option<Weak<RefCell<Node>>>,
    pub(crate) progress: Option<(usize, usize)>,
    /// Set when this node's terminal delivery step has run; a registration
    /// arriving afterwards schedules its own delivery.
    pub(crate) delivered: bool,
    pub(crate) sched: Rc<dyn Schedule>,
}

impl Node {
    pub(crate) fn new(sched: Rc<dyn Schedule>) -> Self {
        Self {
            id: NodeId::next(),
            state: NodeState::Pending,
            callbacks: Vec::new(),
            children: Vec::new(),
            errbacks: Vec::new(),
            abort_listeners: Vec::new(),
            progress_listeners: Vec::new(),
            partial_listeners: Vec::new(),
            finally_hook: None,
            finally_set: false,
            splices: Vec::new(),
            root: None,
            branch: None,
            progress: None,
            delivered: false,
            sched,
        }
    }

    pub(crate) fn clear_back_edges(&mut self) {
        self.root = None;
        self.branch = None;
    }
}

/// A single-resolution asynchronous value forming one node of a chain tree.
///
/// Cloning is cheap and yields another handle to the same node.
#[derive(Clone)]
pub struct Deferred {
    pub(crate) node: Rc<RefCell<Node>>,
}

impl Deferred {
    /// Constructs a pending node bound to the given scheduler capability.
    #[must_use]
    pub fn new(sched: Rc<dyn Schedule>) -> Self {
        Self {
            node: Rc::new(RefCell::new(Node::new(sched))),
        }
    }

    pub(crate) fn from_rc(node: Rc<RefCell<Node>>) -> Self {
        Self { node }
    }

    pub(crate) fn scheduler(&self) -> Rc<dyn Schedule> {
        self.node.borrow().sched.clone()
    }

    /// Returns this node's diagnostic id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.node.borrow().id
    }

    /// Returns a snapshot of the node state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.node.borrow().state.clone()
    }

    /// Returns true while the node is unresolved.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.node.borrow().state.is_pending()
    }

    /// Returns true if the node resolved with a result.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.node.borrow().state.is_succeeded()
    }

    /// Returns true if the node resolved with a failure.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.node.borrow().state.is_failed()
    }

    /// Returns true if the node was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.node.borrow().state.is_aborted()
    }

    // ---------------- resolution ----------------

    /// Resolves this node with a result tuple and schedules delivery to its
    /// children on the next tick.
    ///
    /// A second success is `MisuseError::AlreadyResolved`; success after
    /// failure is a warning and a no-op; success after abort is a silent
    /// no-op.
    pub fn succeed(&self, values: impl IntoValues) -> Result<(), MisuseError> {
        let values = values.into_values();
        {
            let mut n = self.node.borrow_mut();
            match &n.state {
                NodeState::Pending => {
                    n.state = NodeState::Succeeded(values);
                    n.clear_back_edges();
                }
                NodeState::Succeeded(_) => {
                    tracing::warn!(node = %n.id, "success on a succeeded node refused");
                    return Err(MisuseError::AlreadyResolved);
                }
                NodeState::Failed(_) => {
                    tracing::warn!(node = %n.id, "success on a failed node ignored");
                    return Ok(());
                }
                NodeState::Aborted(_) => return Ok(()),
            }
        }
        let this = self.clone();
        self.scheduler()
            .defer(Box::new(move || chain::deliver_success(&this)));
        Ok(())
    }

    /// Fails this node with an error value and schedules the failure walk
    /// on the next tick.
    pub fn fail<T: 'static>(&self, err: T) {
        self.fail_value(val(err));
    }

    /// Fails this node with an already-boxed error value.
    pub fn fail_value(&self, err: Value) {
        self.fail_with(Failure::new(err));
    }

    /// Fails this node with the sentinel "errback called without error"
    /// failure.
    pub fn fail_unspecified(&self) {
        self.fail_with(Failure::unspecified());
    }

    pub(crate) fn fail_with(&self, failure: Failure) {
        {
            let mut n = self.node.borrow_mut();
            match &n.state {
                NodeState::Pending => {
                    n.state = NodeState::Failed(failure);
                    n.clear_back_edges();
                }
                NodeState::Aborted(_) => return,
                NodeState::Failed(_) => {
                    tracing::warn!(node = %n.id, "failure on a failed node ignored");
                    return;
                }
                NodeState::Succeeded(_) => {
                    tracing::warn!(node = %n.id, "failure on a succeeded node ignored");
                    return;
                }
            }
        }
        let this = self.clone();
        self.scheduler()
            .defer(Box::new(move || chain::deliver_failure_root(&this)));
    }

    /// Aborts this node and, one tick later, its whole subtree.
    ///
    /// Abort listeners on this node run synchronously. Aborting a node that
    /// already resolved is a warning and a no-op.
    pub fn abort(&self, args: impl IntoValues) {
        let args = args.into_values();
        let listeners = {
            let mut n = self.node.borrow_mut();
            if n.state.is_terminal() {
                tracing::warn!(
                    node = %n.id,
                    state = n.state.name(),
                    "abort on a terminal node ignored"
                );
                return;
            }
            n.state = NodeState::Aborted(args.clone());
            n.clear_back_edges();
            std::mem::take(&mut n.abort_listeners)
        };
        for listener in listeners {
            listener(&args);
        }
        let this = self.clone();
        self.scheduler()
            .defer(Box::new(move || chain::deliver_abort(&this)));
    }

    /// Aborts the head of this node's branch, cancelling exactly the
    /// surrounding single-successor chain and its subtree.
    pub fn abort_branch(&self) {
        let head = {
            let n = self.node.borrow();
            n.branch.as_ref().and_then(Weak::upgrade)
        };
        match head {
            Some(rc) => Self::from_rc(rc).abort(()),
            None => self.abort(()),
        }
    }

    /// Aborts from the root of the tree this node belongs to.
    pub fn abort_all(&self) {
        let root = {
            let n = self.node.borrow();
            n.root.as_ref().and_then(Weak::upgrade)
        };
        match root {
            Some(rc) => Self::from_rc(rc).abort(()),
            None => self.abort(()),
        }
    }

    // ---------------- continuations and listeners ----------------

    /// Registers a success continuation and returns its next link.
    ///
    /// The continuation receives this node's result tuple and produces the
    /// child's resolution: a value, a full tuple, a spliced inner deferred,
    /// or a raised failure.
    pub fn then<F>(&self, f: F) -> Self
    where
        F: FnOnce(&[Value]) -> CallbackResult + 'static,
    {
        chain::then(self, Box::new(f))
    }

    /// Registers a failure handler local to this node.
    ///
    /// On an already-failed node the handler is invoked one tick later with
    /// the recorded failure; on an aborted node the registration is refused
    /// with a warning.
    pub fn or_if_error<F>(&self, f: F) -> Self
    where
        F: FnOnce(&Failure) + 'static,
    {
        let late = {
            let mut n = self.node.borrow_mut();
            if n.state.is_aborted() {
                tracing::warn!(node = %n.id, "error handler on an aborted node refused");
                return self.clone();
            }
            let index = n.errbacks.len();
            n.errbacks.push(Some(Box::new(f)));
            (n.delivered && n.state.is_failed()).then_some(index)
        };
        if let Some(index) = late {
            let this = self.clone();
            self.scheduler()
                .defer(Box::new(move || chain::run_late_errback(&this, index)));
        }
        self.clone()
    }

    /// Registers an abort listener; invoked immediately when the node is
    /// already aborted.
    pub fn on_abort<F>(&self, f: F) -> Self
    where
        F: FnOnce(&[Value]) + 'static,
    {
        let recorded = {
            let n = self.node.borrow();
            match &n.state {
                NodeState::Aborted(args) => Some(args.clone()),
                _ => None,
            }
        };
        match recorded {
            Some(args) => f(&args),
            None => self.node.borrow_mut().abort_listeners.push(Box::new(f)),
        }
        self.clone()
    }

    /// Registers a progress listener; replayed immediately with the last
    /// progress tuple when one exists.
    pub fn on_progress<F>(&self, f: F) -> Self
    where
        F: FnMut(usize, usize) + 'static,
    {
        let mut f = f;
        let replay = {
            let n = self.node.borrow();
            if n.state.is_aborted() {
                tracing::warn!(node = %n.id, "progress listener on an aborted node refused");
                return self.clone();
            }
            n.progress
        };
        if let Some((done, out_of)) = replay {
            f(done, out_of);
        }
        {
            let mut n = self.node.borrow_mut();
            if n.state.is_aborted() {
                tracing::warn!(node = %n.id, "progress listener on an aborted node refused");
                return self.clone();
            }
            n.progress_listeners.push(Box::new(f));
        }
        self.clone()
    }

    /// Broadcasts a progress tuple to this node's progress listeners.
    pub fn progress(&self, done: usize, out_of: usize) -> Self {
        {
            let mut n = self.node.borrow_mut();
            if n.state.is_aborted() {
                tracing::warn!(node = %n.id, "progress on an aborted node refused");
                return self.clone();
            }
            n.progress = Some((done, out_of));
        }
        let mut listeners = std::mem::take(&mut self.node.borrow_mut().progress_listeners);
        for listener in &mut listeners {
            listener(done, out_of);
        }
        {
            let mut n = self.node.borrow_mut();
            let added = std::mem::take(&mut n.progress_listeners);
            n.progress_listeners = listeners;
            n.progress_listeners.extend(added);
        }
        self.clone()
    }

    /// Registers a partial-result listener.
    pub fn on_partial_result<F>(&self, f: F) -> Self
    where
        F: FnMut(&Value) + 'static,
    {
        let mut n = self.node.borrow_mut();
        if n.state.is_aborted() {
            tracing::warn!(node = %n.id, "partial-result listener on an aborted node refused");
        } else {
            n.partial_listeners.push(Box::new(f));
        }
        drop(n);
        self.clone()
    }

    /// Broadcasts one partial value to this node's partial-result listeners.
    pub fn partial_result<T: 'static>(&self, v: T) -> Self {
        self.partial_result_value(val(v))
    }

    /// Broadcasts an already-boxed partial value.
    pub fn partial_result_value(&self, v: Value) -> Self {
        {
            let n = self.node.borrow();
            if n.state.is_aborted() {
                tracing::warn!(node = %n.id, "partial result on an aborted node refused");
                return self.clone();
            }
        }
        let mut listeners = std::mem::take(&mut self.node.borrow_mut().partial_listeners);
        for listener in &mut listeners {
            listener(&v);
        }
        {
            let mut n = self.node.borrow_mut();
            let added = std::mem::take(&mut n.partial_listeners);
            n.partial_listeners = listeners;
            n.partial_listeners.extend(added);
        }
        self.clone()
    }

    /// Registers the single finally hook, fired exactly once when the node
    /// delivers a success or a failure.
    ///
    /// A second registration is `MisuseError::FinallyAlreadySet`.
    pub fn at_last<F>(&self, f: F) -> Result<(), MisuseError>
    where
        F: FnOnce() + 'static,
    {
        let fire_now = {
            let mut n = self.node.borrow_mut();
            if n.finally_set {
                return Err(MisuseError::FinallyAlreadySet);
            }
            n.finally_set = true;
            n.finally_hook = Some(Box::new(f));
            n.delivered && (n.state.is_succeeded() || n.state.is_failed())
        };
        if fire_now {
            let this = self.clone();
            self.scheduler()
                .defer(Box::new(move || chain::fire_finally(&this)));
        }
        Ok(())
    }

    /// Alias for [`Deferred::at_last`].
    pub fn finally<F>(&self, f: F) -> Result<(), MisuseError>
    where
        F: FnOnce() + 'static,
    {
        self.at_last(f)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.node.borrow();
        write!(f, "Deferred({}, {})", n.id, n.state.name())
    }
}
