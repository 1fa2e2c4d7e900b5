//! Property tests for the chain laws.
//!
//! Laws covered:
//! - attaching a continuation before resolution is equivalent to attaching
//!   it after, up to one turn of the loop
//! - a callback returning an immediately-succeeding deferred is equivalent
//!   to returning the value directly
//! - first-wins resolves once; later input completions change nothing

use deferred::test_utils::{init_test_logging, succeeded_value};
use deferred::{first_of, get, Deferred, Emit, TickLoop};
use proptest::prelude::*;

fn build_chain(d: &Deferred, ops: &[(bool, i32)]) -> Deferred {
    let mut tail = d.clone();
    for &(mul, k) in ops {
        tail = tail.then(move |values| {
            let x = *get::<i64>(values, 0).unwrap();
            let y = if mul { x * i64::from(k) } else { x + i64::from(k) };
            Ok(Emit::value(y))
        });
    }
    tail
}

fn run_chain(attach_before: bool, seed: i64, ops: &[(bool, i32)]) -> i64 {
    let lp = TickLoop::new();
    let d = Deferred::new(lp.handle());
    let tail = if attach_before {
        let tail = build_chain(&d, ops);
        d.succeed((seed,)).unwrap();
        tail
    } else {
        d.succeed((seed,)).unwrap();
        lp.run_until_quiescent();
        build_chain(&d, ops)
    };
    lp.run_until_quiescent();
    succeeded_value::<i64>(&tail).expect("chain should settle successfully")
}

proptest! {
    #[test]
    fn attach_order_is_immaterial(
        seed in -1000i64..1000,
        ops in prop::collection::vec((any::<bool>(), -10i32..10), 0..6),
    ) {
        init_test_logging();
        prop_assert_eq!(run_chain(true, seed, &ops), run_chain(false, seed, &ops));
    }

    #[test]
    fn splice_of_an_immediate_inner_is_identity(y in any::<i32>()) {
        init_test_logging();
        let lp = TickLoop::new();

        let direct_parent = Deferred::new(lp.handle());
        let direct = direct_parent.then(move |_| Ok(Emit::value(y)));

        let spliced_parent = Deferred::new(lp.handle());
        let handle = lp.handle();
        let spliced = spliced_parent.then(move |_| {
            let inner = Deferred::new(handle);
            inner.succeed((y,)).unwrap();
            Ok(Emit::Deferred(inner))
        });

        direct_parent.succeed(()).unwrap();
        spliced_parent.succeed(()).unwrap();
        lp.run_until_quiescent();

        prop_assert_eq!(succeeded_value::<i32>(&direct), Some(y));
        prop_assert_eq!(succeeded_value::<i32>(&spliced), Some(y));
    }

    #[test]
    fn first_wins_resolves_once_and_stays_resolved(
        n in 1usize..5,
        winner_choice in any::<prop::sample::Index>(),
        values in prop::collection::vec(-100i32..100, 5),
    ) {
        init_test_logging();
        let lp = TickLoop::new();
        let inputs: Vec<Deferred> = (0..n).map(|_| Deferred::new(lp.handle())).collect();
        let w = first_of(&inputs);
        let winner = winner_choice.index(n);

        inputs[winner].succeed((values[winner],)).unwrap();
        lp.run_until_quiescent();
        prop_assert_eq!(succeeded_value::<i32>(&w), Some(values[winner]));

        // Late completions on losers are swallowed; the winner's value and
        // the losers' aborted states are final.
        for (k, input) in inputs.iter().enumerate() {
            if k != winner {
                prop_assert!(input.is_aborted());
                input.succeed((values[k],)).unwrap();
                input.fail("late");
            }
        }
        lp.run_until_quiescent();
        prop_assert_eq!(succeeded_value::<i32>(&w), Some(values[winner]));
        for (k, input) in inputs.iter().enumerate() {
            if k != winner {
                prop_assert!(input.is_aborted());
            }
        }
    }
}
