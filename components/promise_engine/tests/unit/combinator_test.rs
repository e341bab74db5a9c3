//! Unit tests for the static combinators and prototype sugar

use super::support::{delayed_reject, delayed_resolve, noop, record, setup};
use core_types::{ErrorKind, Function, JsError, PlainObject, Value};
use promise_engine::{Promise, PromiseState};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

fn values(promise: &Promise) -> String {
    promise.outcome().unwrap().unwrap().to_string()
}

#[test]
fn resolve_wraps_plain_values() {
    let (host, engine) = setup();
    let promise = engine.resolve(Value::from("plain"));
    assert_eq!(promise.state(), PromiseState::Fulfilled);
    host.run_until_done().unwrap();
    assert_eq!(promise.outcome(), Some(Ok(Value::from("plain"))));
}

#[test]
fn resolve_caches_all_literals() {
    let (_host, engine) = setup();
    for literal in [
        Value::Boolean(true),
        Value::Boolean(false),
        Value::Null,
        Value::Undefined,
        Value::Smi(0),
        Value::from(""),
    ] {
        assert!(engine.resolve(literal.clone()).ptr_eq(&engine.resolve(literal)));
    }
}

#[test]
fn reject_keeps_reason_verbatim() {
    let (host, engine) = setup();
    let thenable = PlainObject::new()
        .with("then", Function::new(|_, _| Ok(Value::Undefined)).into())
        .into_value();
    let promise = engine.reject(thenable.clone());
    promise.catch(Some(noop()));
    host.run_until_done().unwrap();
    assert_eq!(promise.outcome(), Some(Err(thenable)));
}

#[test]
fn all_keeps_index_order() {
    let (host, engine) = setup();
    let all = engine.all(&Value::array(vec![
        delayed_resolve(&host, &engine, Value::from("slow"), 30).to_value(),
        delayed_resolve(&host, &engine, Value::from("fast"), 1).to_value(),
        Value::from("now"),
    ]));
    host.run_until_done().unwrap();
    assert_eq!(values(&all), "slow,fast,now");
}

#[test]
fn all_settles_when_last_input_does() {
    let (host, engine) = setup();
    let all = engine.all(&Value::array(vec![
        delayed_resolve(&host, &engine, Value::Smi(1), 10).to_value(),
        delayed_resolve(&host, &engine, Value::Smi(2), 40).to_value(),
    ]));
    host.advance_by(Duration::from_millis(20)).unwrap();
    assert_eq!(all.state(), PromiseState::Pending);
    host.run_until_done().unwrap();
    assert_eq!(values(&all), "1,2");
}

#[test]
fn all_rejects_with_first_rejection() {
    let (host, engine) = setup();
    let all = engine.all(&Value::array(vec![
        delayed_reject(&host, &engine, Value::from("late"), 20).to_value(),
        delayed_reject(&host, &engine, Value::from("early"), 5).to_value(),
        delayed_resolve(&host, &engine, Value::Smi(1), 1).to_value(),
    ]));
    all.catch(Some(noop()));
    host.run_until_done().unwrap();
    assert_eq!(all.outcome(), Some(Err(Value::from("early"))));
}

#[test]
fn all_adopts_foreign_thenables() {
    let (host, engine) = setup();
    let thenable = PlainObject::new()
        .with(
            "then",
            Function::new(|_this, args| args[0].as_function().unwrap().invoke(&[Value::Smi(4)]))
                .into(),
        )
        .into_value();
    let all = engine.all(&Value::array(vec![thenable, Value::Smi(5)]));
    host.run_until_done().unwrap();
    assert_eq!(values(&all), "4,5");
}

#[test]
fn all_rejects_when_then_getter_throws() {
    let (host, engine) = setup();
    let thenable = PlainObject::new();
    thenable.define_getter(
        "then",
        Function::new(|_, _| Err(JsError::reference_error("then").into())),
    );
    let all = engine.all(&Value::array(vec![thenable.into_value()]));
    all.catch(Some(noop()));
    host.run_until_done().unwrap();
    let reason = all.outcome().unwrap().unwrap_err();
    assert_eq!(reason.as_error().unwrap().kind, ErrorKind::ReferenceError);
}

#[test]
fn all_reads_array_likes() {
    let (host, engine) = setup();
    let array_like = PlainObject::new()
        .with("length", Value::Smi(2))
        .with("0", engine.resolve(Value::from("a")).to_value())
        .with("1", Value::from("b"))
        .into_value();
    let all = engine.all(&array_like);
    host.run_until_done().unwrap();
    assert_eq!(values(&all), "a,b");
}

#[test]
fn all_rejects_infinite_array_like() {
    let (host, engine) = setup();
    let array_like = PlainObject::new()
        .with("length", Value::Double(f64::INFINITY))
        .into_value();
    let all = engine.all(&array_like);
    let race = engine.race(&array_like);
    all.catch(Some(noop()));
    race.catch(Some(noop()));
    host.run_until_done().unwrap();
    for promise in [all, race] {
        let reason = promise.outcome().unwrap().unwrap_err();
        assert_eq!(reason.as_error().unwrap().kind, ErrorKind::RangeError);
    }
}

/// Builds `depth` promises each adopting the next, the last one settled
/// later by the returned resolver.
fn adopted_chain(engine: &promise_engine::Engine, depth: usize) -> (Promise, Function) {
    let saved = Rc::new(RefCell::new(None));
    let slot = saved.clone();
    let mut current = engine.new_promise(move |resolve, _| {
        *slot.borrow_mut() = Some(resolve);
        Ok(Value::Undefined)
    });
    for _ in 0..depth {
        let inner = current.to_value();
        current = engine.new_promise(move |resolve, _| resolve.invoke(&[inner]));
        assert_eq!(current.state(), PromiseState::Adopted);
    }
    let resolve = saved.borrow_mut().take().unwrap();
    (current, resolve)
}

#[test]
fn all_fast_path_matches_generic_path_for_nested_adoption() {
    let (host, engine) = setup();

    let (fast, resolve_fast) = adopted_chain(&engine, 3);
    let (slow, resolve_slow) = adopted_chain(&engine, 3);
    // Hiding `slow` behind a plain thenable forces the generic path.
    let wrapped = {
        let slow = slow.clone();
        PlainObject::new()
            .with(
                "then",
                Function::new(move |_this, args| {
                    let handler = |i: usize| args.get(i).and_then(Value::as_function).cloned();
                    Ok(slow.then(handler(0), handler(1)).to_value())
                })
                .into(),
            )
            .into_value()
    };

    let via_fast = engine.all(&Value::array(vec![fast.to_value(), Value::Smi(0)]));
    let via_generic = engine.all(&Value::array(vec![wrapped, Value::Smi(0)]));
    host.run_until_done().unwrap();
    assert_eq!(via_fast.state(), PromiseState::Pending);
    assert_eq!(via_generic.state(), PromiseState::Pending);

    resolve_fast.invoke(&[Value::from("done")]).unwrap();
    resolve_slow.invoke(&[Value::from("done")]).unwrap();
    host.run_until_done().unwrap();
    assert_eq!(values(&via_fast), "done,0");
    assert_eq!(values(&via_generic), values(&via_fast));
}

#[test]
fn all_fast_path_reads_settled_nested_adoption() {
    let (host, engine) = setup();
    let (chain, resolve) = adopted_chain(&engine, 2);
    resolve.invoke(&[Value::Smi(6)]).unwrap();
    let all = engine.all(&Value::array(vec![chain.to_value()]));
    host.run_until_done().unwrap();
    assert_eq!(values(&all), "6");
}

#[test]
fn race_takes_first_rejection_too() {
    let (host, engine) = setup();
    let race = engine.race(&Value::array(vec![
        delayed_resolve(&host, &engine, Value::Smi(1), 10).to_value(),
        delayed_reject(&host, &engine, Value::from("fail"), 2).to_value(),
    ]));
    race.catch(Some(noop()));
    host.run_until_done().unwrap();
    assert_eq!(race.outcome(), Some(Err(Value::from("fail"))));
}

#[test]
fn race_with_plain_values_takes_first() {
    let (host, engine) = setup();
    let race = engine.race(&Value::array(vec![Value::from("a"), Value::from("b")]));
    host.run_until_done().unwrap();
    assert_eq!(race.outcome(), Some(Ok(Value::from("a"))));
}

#[test]
fn catch_recovers() {
    let (host, engine) = setup();
    let recovered = engine
        .reject(Value::Smi(1))
        .catch(Some(Function::unary(|_| Ok(Value::from("ok")))));
    host.run_until_done().unwrap();
    assert_eq!(recovered.outcome(), Some(Ok(Value::from("ok"))));
}

#[test]
fn finally_waits_for_returned_promise() {
    let (host, engine) = setup();
    let log = Rc::new(RefCell::new(vec![]));
    let gate = delayed_resolve(&host, &engine, Value::from("ignored"), 25);
    let promise = engine
        .resolve(Value::from("kept"))
        .finally(Function::unary(move |_| Ok(gate.to_value())));
    promise.then(Some(record(&log, "after")), None);

    host.advance_by(Duration::from_millis(10)).unwrap();
    assert!(log.borrow().is_empty());
    host.run_until_done().unwrap();
    assert_eq!(*log.borrow(), vec!["after:kept"]);
}

#[test]
fn finally_throw_overrides_fulfillment() {
    let (host, engine) = setup();
    let promise = engine
        .resolve(Value::Smi(1))
        .finally(Function::unary(|_| Err(Value::from("cleanup failed"))));
    promise.catch(Some(noop()));
    host.run_until_done().unwrap();
    assert_eq!(promise.outcome(), Some(Err(Value::from("cleanup failed"))));
}

#[test]
fn finally_rejected_promise_overrides_rejection() {
    let (host, engine) = setup();
    let override_engine = engine.clone();
    let promise = engine
        .reject(Value::from("original"))
        .finally(Function::unary(move |_| {
            let replacement = override_engine.reject(Value::from("replacement"));
            Ok(replacement.to_value())
        }));
    promise.catch(Some(noop()));
    host.run_until_done().unwrap();
    assert_eq!(promise.outcome(), Some(Err(Value::from("replacement"))));
}

#[test]
fn done_rethrows_unhandled_rejection_to_host() {
    let (host, engine) = setup();
    engine.reject(Value::from("lost")).then(Some(noop()), None).done(None, None);
    assert_eq!(host.run_until_done(), Err(Value::from("lost")));
}

#[test]
fn done_rethrows_handler_failure() {
    let (host, engine) = setup();
    engine.resolve(Value::Smi(1)).done(
        Some(Function::unary(|_| Err(Value::from("handler failed")))),
        None,
    );
    assert_eq!(host.run_until_done(), Err(Value::from("handler failed")));
}

#[test]
fn done_is_silent_when_handled() {
    let (host, engine) = setup();
    let seen = Rc::new(Cell::new(false));
    let flag = seen.clone();
    engine.reject(Value::from("expected")).done(
        None,
        Some(Function::unary(move |_| {
            flag.set(true);
            Ok(Value::Undefined)
        })),
    );
    host.run_until_done().unwrap();
    assert!(seen.get());
    assert!(host.is_task_queue_empty());
}
