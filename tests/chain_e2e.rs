//! End-to-end scenarios for deferred chains, branches, and combinators.

use deferred::test_utils::{init_test_logging, pending_on_loop, succeeded_value};
use deferred::{
    all_of, assert_aborted, assert_failed, assert_succeeded, clear_default_error_handler,
    first_of, get, node::throw, set_default_error_handler, val, Deferred, Emit,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn linear_chain_feeds_each_result_forward() {
    let (lp, d) = pending_on_loop();
    let end = d
        .then(|values| {
            let x = *get::<i32>(values, 0).unwrap();
            Ok(Emit::value(x + 1))
        })
        .then(|values| {
            let x = *get::<i32>(values, 0).unwrap();
            Ok(Emit::value(x * 2))
        });
    d.succeed((3i32,)).unwrap();
    lp.run_until_quiescent();
    assert_succeeded!(end, i32, 8);
}

#[test]
fn errors_bubble_per_branch_and_fall_back_per_branch() {
    let (lp, d) = pending_on_loop();

    let _bare = d.then(|_| throw("E1"));
    let handled_branch = d.then(|_| throw("E2"));
    let observed = Rc::new(RefCell::new(Vec::new()));
    let obs = observed.clone();
    handled_branch.or_if_error(move |failure| {
        obs.borrow_mut()
            .push(*failure.downcast_ref::<&str>().unwrap());
    });

    let fallback_seen = Rc::new(RefCell::new(Vec::new()));
    let fb = fallback_seen.clone();
    set_default_error_handler(move |failure| {
        fb.borrow_mut()
            .push(*failure.downcast_ref::<&str>().unwrap());
    });

    d.succeed(()).unwrap();
    lp.run_until_quiescent();
    clear_default_error_handler();

    assert_eq!(*observed.borrow(), vec!["E2"]);
    assert_eq!(*fallback_seen.borrow(), vec!["E1"]);
}

#[test]
fn spliced_inner_with_its_own_handler_absorbs_the_failure() {
    let (lp, d) = pending_on_loop();
    let inner = Deferred::new(lp.handle());
    inner.or_if_error(|_| {});

    let inner2 = inner.clone();
    let outer = d.then(move |_| Ok(Emit::Deferred(inner2)));
    let ran = Rc::new(Cell::new(false));
    let ran2 = ran.clone();
    let end = outer.then(move |_| {
        ran2.set(true);
        Ok(Emit::nothing())
    });

    inner.fail("E");
    d.succeed(()).unwrap();
    lp.run_until_quiescent();

    assert!(outer.is_pending());
    assert!(end.is_pending());
    assert!(!ran.get());
}

#[test]
fn all_join_aggregates_and_streams_progress() {
    let (lp, a) = pending_on_loop();
    let b = Deferred::new(lp.handle());

    let join = all_of(&[a.clone(), b.clone()]);
    let progress = Rc::new(RefCell::new(Vec::new()));
    let prog = progress.clone();
    join.on_progress(move |done, out_of| prog.borrow_mut().push((done, out_of)));

    let pair = Rc::new(Cell::new((0i32, 0i32)));
    let pair2 = pair.clone();
    join.then(move |values| {
        pair2.set((
            *get::<i32>(values, 0).unwrap(),
            *get::<i32>(values, 1).unwrap(),
        ));
        Ok(Emit::nothing())
    });

    a.succeed((1i32,)).unwrap();
    b.succeed((2i32,)).unwrap();
    lp.run_until_quiescent();

    assert_eq!(pair.get(), (1, 2));
    assert_eq!(*progress.borrow(), vec![(1, 2), (2, 2)]);
}

#[test]
fn first_wins_takes_the_fast_input_and_aborts_the_slow_one() {
    let (lp, slow) = pending_on_loop();
    let fast = Deferred::new(lp.handle());

    let aborted = Rc::new(Cell::new(false));
    let ab = aborted.clone();
    slow.on_abort(move |_| ab.set(true));

    let w = first_of(&[slow.clone(), fast.clone()]);
    let winner_value = Rc::new(RefCell::new(String::new()));
    let wv = winner_value.clone();
    w.then(move |values| {
        wv.borrow_mut()
            .push_str(get::<&str>(values, 0).unwrap());
        Ok(Emit::nothing())
    });

    fast.succeed(("ok",)).unwrap();
    lp.run_until_quiescent();

    assert_eq!(*winner_value.borrow(), "ok");
    assert_aborted!(slow);
    assert!(aborted.get());
}

#[test]
fn abort_before_resolve_skips_the_continuation() {
    let (lp, d) = pending_on_loop();
    let ran = Rc::new(Cell::new(false));
    let ran2 = ran.clone();
    let child = d.then(move |_| {
        ran2.set(true);
        Ok(Emit::nothing())
    });
    let reason = Rc::new(RefCell::new(String::new()));
    let r = reason.clone();
    child.on_abort(move |args| {
        r.borrow_mut().push_str(get::<&str>(args, 0).unwrap());
    });

    d.abort(("reason",));
    lp.run_until_quiescent();

    assert!(!ran.get());
    assert_eq!(*reason.borrow(), "reason");
    assert_aborted!(child);
}

#[test]
fn attaching_before_and_after_resolution_observes_the_same_value() {
    init_test_logging();
    let (lp, before) = pending_on_loop();
    let before_child = before.then(|values| {
        let x = *get::<i32>(values, 0).unwrap();
        Ok(Emit::value(x))
    });
    before.succeed((7i32,)).unwrap();
    lp.run_until_quiescent();

    let after = Deferred::new(lp.handle());
    after.succeed((7i32,)).unwrap();
    lp.run_until_quiescent();
    let after_child = after.then(|values| {
        let x = *get::<i32>(values, 0).unwrap();
        Ok(Emit::value(x))
    });
    lp.run_until_quiescent();

    assert_eq!(succeeded_value::<i32>(&before_child), Some(7));
    assert_eq!(succeeded_value::<i32>(&after_child), Some(7));
}

#[test]
fn callback_aborting_a_sibling_link_skips_that_sibling() {
    let (lp, d) = pending_on_loop();
    let second_ran = Rc::new(Cell::new(false));

    let siblings: Rc<RefCell<Vec<Deferred>>> = Rc::new(RefCell::new(Vec::new()));
    let sib = siblings.clone();
    let _first = d.then(move |_| {
        for s in sib.borrow().iter() {
            s.abort(());
        }
        Ok(Emit::nothing())
    });
    let ran = second_ran.clone();
    let second = d.then(move |_| {
        ran.set(true);
        Ok(Emit::nothing())
    });
    siblings.borrow_mut().push(second.clone());

    d.succeed(()).unwrap();
    lp.run_until_quiescent();

    assert!(!second_ran.get());
    assert_aborted!(second);
}

#[test]
fn abort_branch_cancels_exactly_one_branch() {
    let (lp, d) = pending_on_loop();
    let kept = d.then(|_| Ok(Emit::nothing()));
    let cancelled_head = d.then(|_| Ok(Emit::nothing()));
    let cancelled_leaf = cancelled_head.then(|_| Ok(Emit::nothing()));

    cancelled_leaf.abort_branch();
    lp.run_until_quiescent();

    assert_aborted!(cancelled_head);
    assert_aborted!(cancelled_leaf);
    assert!(kept.is_pending());
    assert!(d.is_pending());

    d.succeed((1i32,)).unwrap();
    lp.run_until_quiescent();
    assert_succeeded!(kept);
}

#[test]
fn finally_fires_on_success_but_not_on_abort() {
    let (lp, ok) = pending_on_loop();
    let fired = Rc::new(Cell::new(0));
    let f = fired.clone();
    ok.at_last(move || f.set(f.get() + 1)).unwrap();
    ok.succeed(()).unwrap();
    lp.run_until_quiescent();
    assert_eq!(fired.get(), 1);

    let gone = Deferred::new(lp.handle());
    let not_fired = Rc::new(Cell::new(0));
    let nf = not_fired.clone();
    gone.at_last(move || nf.set(nf.get() + 1)).unwrap();
    gone.abort(());
    lp.run_until_quiescent();
    assert_eq!(not_fired.get(), 0);
}

#[test]
fn failed_node_reports_failure_to_late_handlers() {
    let (lp, d) = pending_on_loop();
    d.or_if_error(|_| {});
    d.fail_value(val("early"));
    lp.run_until_quiescent();
    assert_failed!(d);

    let seen = Rc::new(Cell::new(false));
    let s = seen.clone();
    d.or_if_error(move |failure| {
        assert_eq!(failure.downcast_ref::<&str>(), Some(&"early"));
        s.set(true);
    });
    lp.run_until_quiescent();
    assert!(seen.get());
}

#[test]
#[should_panic(expected = "unhandled failure")]
fn unhandled_failure_without_a_fallback_is_fatal() {
    let (lp, d) = pending_on_loop();
    clear_default_error_handler();
    d.fail("nobody listens");
    lp.run_until_quiescent();
}

#[test]
#[should_panic(expected = "handler bug")]
fn a_panicking_handler_is_re_raised() {
    let (lp, d) = pending_on_loop();
    d.or_if_error(|_| panic!("handler bug"));
    d.fail("boom");
    lp.run_until_quiescent();
}
