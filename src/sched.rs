//! Host scheduling contract and the deterministic tick loop.
//!
//! The library consumes exactly one primitive from its host: *run this
//! closure after the current synchronous call stack unwinds*. Hosts with an
//! event loop implement [`Schedule`] on a handle to it; everyone else (and
//! every test in this crate) drives a [`TickLoop`].
//!
//! # Determinism
//!
//! `TickLoop` is a plain FIFO: thunks run in the order they were deferred,
//! one per tick, and [`TickLoop::run_until_quiescent`] drives the queue to
//! empty with a step bound so a buggy self-rescheduling chain terminates the
//! run instead of hanging it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// A deferred unit of work.
pub type Thunk = Box<dyn FnOnce()>;

/// The contract consumed from the host scheduler: run `thunk` on the next
/// tick of the loop, after the current synchronous call stack unwinds.
pub trait Schedule {
    /// Queues `thunk` to run on the next tick.
    fn defer(&self, thunk: Thunk);
}

/// Bound on [`TickLoop::run_until_quiescent`]; a healthy chain settles in a
/// handful of ticks.
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

#[derive(Default)]
struct TickLoopInner {
    queue: RefCell<VecDeque<Thunk>>,
    steps: Cell<u64>,
}

/// Deterministic single-threaded FIFO loop.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct TickLoop {
    inner: Rc<TickLoopInner>,
}

impl TickLoop {
    /// Creates an empty loop.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a shareable [`Schedule`] capability for this loop.
    #[must_use]
    pub fn handle(&self) -> Rc<dyn Schedule> {
        Rc::new(self.clone())
    }

    /// Returns true when no work is queued.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Returns the number of thunks executed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.inner.steps.get()
    }

    /// Runs one queued thunk. Returns false when the queue was empty.
    pub fn tick(&self) -> bool {
        let Some(thunk) = self.inner.queue.borrow_mut().pop_front() else {
            return false;
        };
        self.inner.steps.set(self.inner.steps.get() + 1);
        thunk();
        true
    }

    /// Runs until the queue is empty or the step bound is hit.
    ///
    /// Returns the number of thunks executed by this call.
    pub fn run_until_quiescent(&self) -> u64 {
        self.run_bounded(DEFAULT_STEP_LIMIT)
    }

    /// Runs at most `max_steps` thunks, stopping early at quiescence.
    pub fn run_bounded(&self, max_steps: u64) -> u64 {
        let mut executed = 0;
        while executed < max_steps && self.tick() {
            executed += 1;
        }
        executed
    }
}

impl Schedule for TickLoop {
    fn defer(&self, thunk: Thunk) {
        self.inner.queue.borrow_mut().push_back(thunk);
    }
}
