#![forbid(unsafe_code)]

//! Catalog of behavioural scenarios.
//!
//! Each scenario builds computations on a fresh [`RunLoop`], drains it, and
//! checks the observable outcome. A scenario returns `Err(detail)` on the
//! first mismatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use settle_core::{
    ChainingCycle, Computation, Deferred, Reason, Resolution, Resolvers, Settled, Status, ThenFn,
    ThenMethod, Thenable, all, all_settled, race,
};
use settle_runtime::RunLoop;

pub type ScenarioFn = fn(&RunLoop) -> Result<(), String>;

#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub summary: &'static str,
    pub run: ScenarioFn,
}

pub const CATALOG: &[Scenario] = &[
    Scenario {
        name: "increment-chain",
        summary: "fulfil 5, chain +1, observe 6",
        run: increment_chain,
    },
    Scenario {
        name: "rejection-recovery",
        summary: "reject \"boom\", rejection handler returns its length",
        run: rejection_recovery,
    },
    Scenario {
        name: "adopt-pending",
        summary: "continuation returns a pending computation and is adopted",
        run: adopt_pending,
    },
    Scenario {
        name: "double-fulfill",
        summary: "second fulfil is a silent no-op",
        run: double_fulfill,
    },
    Scenario {
        name: "monotonic-settlement",
        summary: "no call after the first changes status or outcome",
        run: monotonic_settlement,
    },
    Scenario {
        name: "exactly-once",
        summary: "every continuation fires once, the unused half never",
        run: exactly_once,
    },
    Scenario {
        name: "registration-order",
        summary: "continuations fire in the order they were registered",
        run: registration_order,
    },
    Scenario {
        name: "deferred-notification",
        summary: "no continuation runs inside chain or the settling call",
        run: deferred_notification,
    },
    Scenario {
        name: "nested-flattening",
        summary: "adoption through several levels yields the innermost value",
        run: nested_flattening,
    },
    Scenario {
        name: "self-adoption-cycle",
        summary: "returning the dependent itself rejects with a chaining cycle",
        run: self_adoption_cycle,
    },
    Scenario {
        name: "mutual-adoption-cycle",
        summary: "two computations adopting each other reject instead of hanging",
        run: mutual_adoption_cycle,
    },
    Scenario {
        name: "rejection-tunneling",
        summary: "rejections skip fulfilment-only links until handled",
        run: rejection_tunneling,
    },
    Scenario {
        name: "thenable-latch",
        summary: "a thenable's resolve, reject and error settle exactly once",
        run: thenable_latch,
    },
    Scenario {
        name: "thenable-accessor-error",
        summary: "failing to retrieve then rejects the dependent",
        run: thenable_accessor_error,
    },
    Scenario {
        name: "all-ordering",
        summary: "all keeps input order and rejects with the first rejection",
        run: all_ordering,
    },
    Scenario {
        name: "race-first-wins",
        summary: "race settles like the first member to settle",
        run: race_first_wins,
    },
    Scenario {
        name: "all-settled",
        summary: "all_settled reports every outcome and never rejects",
        run: all_settled_outcomes,
    },
    Scenario {
        name: "deep-chain",
        summary: "10k adopting links settle in one drain; an abandoned chain drops cleanly",
        run: deep_chain,
    },
];

#[must_use]
pub fn find(name: &str) -> Option<&'static Scenario> {
    CATALOG.iter().find(|s| s.name == name)
}

// ── Checks ───────────────────────────────────────────────────────────

fn drain(run_loop: &RunLoop) -> Result<(), String> {
    run_loop
        .run_until_stalled()
        .map(|_| ())
        .map_err(|err| err.to_string())
}

fn check(what: &str, condition: bool) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(format!("{what}: check failed"))
    }
}

fn check_eq<T: PartialEq + fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, got {actual:?}"))
    }
}

fn recorder<T: 'static>() -> Rc<RefCell<Vec<T>>> {
    Rc::new(RefCell::new(Vec::new()))
}

// ── Scenarios ────────────────────────────────────────────────────────

fn increment_chain(run_loop: &RunLoop) -> Result<(), String> {
    let c = Computation::<i32, Reason>::new(&run_loop.handle(), |r| {
        r.fulfill(5);
        Ok(())
    })
    .then(|v| Ok(Resolution::Value(v + 1)));
    drain(run_loop)?;
    check_eq("value", c.value(), Some(6))
}

fn rejection_recovery(run_loop: &RunLoop) -> Result<(), String> {
    let c = Computation::<usize, String>::new(&run_loop.handle(), |r| {
        r.reject("boom".to_owned());
        Ok(())
    })
    .chain(
        None,
        Some(Box::new(|reason: String| Ok(Resolution::Value(reason.len())))),
    );
    drain(run_loop)?;
    check_eq("value", c.value(), Some(4))
}

fn adopt_pending(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let c2 = Deferred::<&'static str, Reason>::new(&s);
    let adopted = c2.computation();
    let next = Computation::<&'static str, Reason>::fulfilled(&s, "first")
        .then(move |_| Ok(Resolution::Computation(adopted)));
    drain(run_loop)?;
    check_eq("status before c2 settles", next.status(), Status::Pending)?;
    c2.fulfill("x");
    drain(run_loop)?;
    check_eq("value", next.value(), Some("x"))
}

fn double_fulfill(run_loop: &RunLoop) -> Result<(), String> {
    let second = Rc::new(Cell::new(true));
    let observed = Rc::clone(&second);
    let c = Computation::<i32, Reason>::new(&run_loop.handle(), move |r| {
        r.fulfill(42);
        observed.set(r.fulfill(43));
        Ok(())
    });
    drain(run_loop)?;
    check("second fulfil ignored", !second.get())?;
    check_eq("value", c.value(), Some(42))
}

fn monotonic_settlement(run_loop: &RunLoop) -> Result<(), String> {
    let deferred = Deferred::<i32, Reason>::new(&run_loop.handle());
    let c = deferred.computation();
    deferred.reject(Reason::from("first"));
    drain(run_loop)?;
    let accepted = [
        deferred.fulfill(1),
        deferred.reject(Reason::from("second")),
        deferred.resolve(Resolution::Value(2)),
    ];
    drain(run_loop)?;
    check("later calls rejected", accepted.iter().all(|a| !a))?;
    check_eq("status", c.status(), Status::Rejected)?;
    check_eq("reason", c.reason(), Some(Reason::from("first")))
}

fn exactly_once(run_loop: &RunLoop) -> Result<(), String> {
    let deferred = Deferred::<i32, Reason>::new(&run_loop.handle());
    let fulfilled = Rc::new(Cell::new(0));
    let rejected = Rc::new(Cell::new(0));
    for _ in 0..3 {
        let f = Rc::clone(&fulfilled);
        let r = Rc::clone(&rejected);
        deferred.computation().then_or_else(
            move |_| {
                f.set(f.get() + 1);
                Ok(Resolution::Value(()))
            },
            move |_| {
                r.set(r.get() + 1);
                Ok(Resolution::Value(()))
            },
        );
    }
    deferred.fulfill(1);
    deferred.reject(Reason::from("ignored"));
    drain(run_loop)?;
    drain(run_loop)?;
    check_eq("fulfilment calls", fulfilled.get(), 3)?;
    check_eq("rejection calls", rejected.get(), 0)
}

fn registration_order(run_loop: &RunLoop) -> Result<(), String> {
    let deferred = Deferred::<i32, Reason>::new(&run_loop.handle());
    let order = recorder();
    for name in ["h1", "h2", "h3"] {
        let order = Rc::clone(&order);
        deferred.computation().map(move |_| order.borrow_mut().push(name));
    }
    deferred.fulfill(0);
    drain(run_loop)?;
    check_eq("order", order.borrow().clone(), vec!["h1", "h2", "h3"])
}

fn deferred_notification(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let log = recorder();

    let settled = Computation::<i32, Reason>::fulfilled(&s, 1);
    let on_settled = Rc::clone(&log);
    settled.map(move |_| on_settled.borrow_mut().push("settled continuation"));
    log.borrow_mut().push("chain returned");

    let deferred = Deferred::<i32, Reason>::new(&s);
    let on_pending = Rc::clone(&log);
    deferred
        .computation()
        .map(move |_| on_pending.borrow_mut().push("pending continuation"));
    deferred.fulfill(2);
    log.borrow_mut().push("fulfil returned");

    drain(run_loop)?;
    check_eq(
        "order",
        log.borrow().clone(),
        vec![
            "chain returned",
            "fulfil returned",
            "settled continuation",
            "pending continuation",
        ],
    )
}

fn nested_flattening(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let innermost = Deferred::<u32, Reason>::new(&s);
    let mut outer = innermost.computation();
    for _ in 0..4 {
        let inner = outer;
        outer = Computation::<u32, Reason>::fulfilled(&s, 0).and_then(move |_| inner);
    }
    drain(run_loop)?;
    check_eq("status before settle", outer.status(), Status::Pending)?;
    innermost.fulfill(99);
    drain(run_loop)?;
    check_eq("value", outer.value(), Some(99))
}

fn self_adoption_cycle(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let slot: Rc<RefCell<Option<Computation<i32, Reason>>>> = Rc::new(RefCell::new(None));
    let reader = Rc::clone(&slot);
    let next = Computation::<i32, Reason>::fulfilled(&s, 1).then(move |_| {
        match reader.borrow().clone() {
            Some(me) => Ok(Resolution::Computation(me)),
            None => Err(Reason::from("dependent not stored")),
        }
    });
    *slot.borrow_mut() = Some(next.clone());
    drain(run_loop)?;
    check_eq(
        "reason",
        next.reason(),
        Some(Reason::from(ChainingCycle { id: next.id() })),
    )
}

fn mutual_adoption_cycle(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let a = Deferred::<i32, Reason>::new(&s);
    let b = Deferred::<i32, Reason>::new(&s);
    a.resolve(Resolution::Computation(b.computation()));
    b.resolve(Resolution::Computation(a.computation()));
    drain(run_loop)?;
    check(
        "a rejected with cycle",
        a.computation().reason().is_some_and(|r| r.is_chaining_cycle()),
    )?;
    check(
        "b rejected with cycle",
        b.computation().reason().is_some_and(|r| r.is_chaining_cycle()),
    )
}

fn rejection_tunneling(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let skipped = Rc::new(Cell::new(false));
    let flag = Rc::clone(&skipped);
    let tail = Computation::<i32, Reason>::rejected(&s, Reason::from("R"))
        .map(move |v| {
            flag.set(true);
            v
        })
        .map(|v| v + 1);
    drain(run_loop)?;
    check("fulfilment handler skipped", !skipped.get())?;
    check_eq("reason", tail.reason(), Some(Reason::from("R")))
}

struct Unruly;

impl Thenable<i32, Reason> for Unruly {
    fn then_method(&self) -> Result<ThenMethod<i32, Reason>, Reason> {
        Ok(Box::new(|r: Resolvers<i32, Reason>| {
            r.resolve(Resolution::Value(1));
            r.reject(Reason::from("ignored"));
            Err(Reason::from("also ignored"))
        }))
    }
}

fn thenable_latch(run_loop: &RunLoop) -> Result<(), String> {
    let next: Computation<i32, Reason> =
        Computation::<(), Reason>::fulfilled(&run_loop.handle(), ())
            .then(|()| Ok(Resolution::thenable(Unruly)));
    drain(run_loop)?;
    check_eq("outcome", next.outcome(), Some(Ok(1)))
}

struct BrokenAccessor;

impl Thenable<i32, Reason> for BrokenAccessor {
    fn then_method(&self) -> Result<ThenMethod<i32, Reason>, Reason> {
        Err(Reason::from("then accessor failed"))
    }
}

fn thenable_accessor_error(run_loop: &RunLoop) -> Result<(), String> {
    let next: Computation<i32, Reason> =
        Computation::<(), Reason>::fulfilled(&run_loop.handle(), ())
            .then(|()| Ok(Resolution::thenable(BrokenAccessor)));
    drain(run_loop)?;
    check_eq(
        "reason",
        next.reason(),
        Some(Reason::from("then accessor failed")),
    )
}

fn all_ordering(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let slow = Deferred::<i32, Reason>::new(&s);
    let joined = all(
        &s,
        [
            Resolution::Computation(slow.computation()),
            Resolution::Value(2),
            Resolution::thenable(ThenFn(|r: Resolvers<i32, Reason>| {
                r.fulfill(3);
                Ok(())
            })),
        ],
    );
    drain(run_loop)?;
    check_eq("status before slow settles", joined.status(), Status::Pending)?;
    slow.fulfill(1);
    drain(run_loop)?;
    check_eq("values", joined.value(), Some(vec![1, 2, 3]))?;

    let failing = Deferred::<i32, Reason>::new(&s);
    let rejected = all(
        &s,
        [
            Resolution::Computation(Deferred::new(&s).computation()),
            Resolution::Computation(failing.computation()),
        ],
    );
    failing.reject(Reason::from("first"));
    drain(run_loop)?;
    check_eq("reason", rejected.reason(), Some(Reason::from("first")))
}

fn race_first_wins(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let slow = Deferred::<&'static str, Reason>::new(&s);
    let fast = Deferred::<&'static str, Reason>::new(&s);
    let raced = race(
        &s,
        [
            Resolution::Computation(slow.computation()),
            Resolution::Computation(fast.computation()),
        ],
    );
    fast.reject(Reason::from("fast failure"));
    drain(run_loop)?;
    slow.fulfill("slow");
    drain(run_loop)?;
    check_eq("reason", raced.reason(), Some(Reason::from("fast failure")))
}

fn all_settled_outcomes(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let outcomes = all_settled(
        &s,
        [
            Resolution::Computation(Computation::rejected(&s, Reason::from("no"))),
            Resolution::Value(7),
        ],
    );
    drain(run_loop)?;
    check_eq(
        "outcomes",
        outcomes.value(),
        Some(vec![
            Settled::Rejected(Reason::from("no")),
            Settled::Fulfilled(7),
        ]),
    )
}

const DEEP_CHAIN_LINKS: u32 = 10_000;

fn deep_chain(run_loop: &RunLoop) -> Result<(), String> {
    let s = run_loop.handle();
    let head = Deferred::<u32, Reason>::new(&s);
    let mut tail = head.computation();
    for _ in 0..DEEP_CHAIN_LINKS {
        let s = s.clone();
        tail = tail.and_then(move |v| Computation::fulfilled(&s, v + 1));
    }
    head.fulfill(0);
    drain(run_loop)?;
    check_eq("value", tail.value(), Some(DEEP_CHAIN_LINKS))?;

    let abandoned = Deferred::<u32, Reason>::new(&s);
    let mut tail = abandoned.computation();
    for _ in 0..DEEP_CHAIN_LINKS {
        tail = tail.map(|v| v + 1);
    }
    check_eq("abandoned status", tail.status(), Status::Pending)?;
    drop(tail);
    drop(abandoned);
    check("nothing scheduled by the drop", run_loop.is_idle())
}
