//! Contract tests for promise_engine
//!
//! These tests pin down the observable guarantees of the engine: handler
//! order, identity of `resolve`, combinator results, the unhandled
//! rejection report and the `finally` semantics.

use core_types::{Function, JsError, Value};
use promise_engine::{Engine, EventLoop, HostOptions, HostScheduler, Promise, TrackerOptions};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

fn setup() -> (Rc<EventLoop>, Engine) {
    let host = Rc::new(EventLoop::new());
    let engine = Engine::new(HostOptions::new(host.clone()));
    (host, engine)
}

fn delayed_resolve(host: &Rc<EventLoop>, engine: &Engine, value: Value, ms: u64) -> Promise {
    let host = host.clone();
    engine.new_promise(move |resolve, _| {
        host.set_timeout(
            Box::new(move || resolve.invoke(&[value]).map(|_| ())),
            Duration::from_millis(ms),
        );
        Ok(Value::Undefined)
    })
}

mod ordering_contract {
    use super::*;

    #[test]
    fn handlers_on_fulfilled_promise_run_in_attachment_order() {
        let (host, engine) = setup();
        let log = Rc::new(RefCell::new(vec![]));
        let promise = engine.resolve(Value::Smi(1));
        for tag in ["h1", "h2"] {
            let log = log.clone();
            promise.then(
                Some(Function::unary(move |_| {
                    log.borrow_mut().push(tag);
                    Ok(Value::Undefined)
                })),
                None,
            );
        }
        host.run_until_done().unwrap();
        assert_eq!(*log.borrow(), vec!["h1", "h2"]);
    }

    #[test]
    fn then_maps_fulfillment() {
        let (host, engine) = setup();
        let promise = engine
            .new_promise(|resolve, _| resolve.invoke(&[Value::Smi(42)]))
            .then(
                Some(Function::unary(|v| Ok(Value::Smi(v.as_number().unwrap() as i32 + 1)))),
                None,
            );
        host.run_until_done().unwrap();
        assert_eq!(promise.outcome(), Some(Ok(Value::Smi(43))));
    }
}

mod resolve_contract {
    use super::*;

    #[test]
    fn resolve_of_own_promise_is_identity() {
        let (_host, engine) = setup();
        let pending = engine.new_promise(|_, _| Ok(Value::Undefined));
        let settled = engine.resolve(Value::from("v"));
        assert!(engine.resolve(pending.to_value()).ptr_eq(&pending));
        assert!(engine.resolve(settled.to_value()).ptr_eq(&settled));
    }
}

mod combinator_contract {
    use super::*;

    #[test]
    fn all_resolves_in_index_order() {
        let (host, engine) = setup();
        let all = engine.all(&Value::array(vec![
            Value::Smi(1),
            delayed_resolve(&host, &engine, Value::Smi(2), 10).to_value(),
            Value::Smi(3),
        ]));
        host.run_until_done().unwrap();
        let result = all.outcome().unwrap().unwrap();
        let Value::Array(items) = result else {
            panic!("expected an array, got {:?}", result);
        };
        assert_eq!(*items.borrow(), vec![Value::Smi(1), Value::Smi(2), Value::Smi(3)]);
    }

    #[test]
    fn race_resolves_to_first_settled() {
        let (host, engine) = setup();
        let race = engine.race(&Value::array(vec![
            delayed_resolve(&host, &engine, Value::from("v1"), 50).to_value(),
            delayed_resolve(&host, &engine, Value::from("v2"), 5).to_value(),
        ]));
        host.run_until_done().unwrap();
        assert_eq!(race.outcome(), Some(Ok(Value::from("v2"))));
    }
}

mod tracker_contract {
    use super::*;

    type Reports = Rc<RefCell<Vec<(u64, String)>>>;

    fn enable_recording(engine: &Engine) -> (Reports, Reports) {
        let unhandled: Reports = Rc::new(RefCell::new(vec![]));
        let handled: Reports = Rc::new(RefCell::new(vec![]));
        let (u, h) = (unhandled.clone(), handled.clone());
        engine.enable(
            TrackerOptions::new()
                .all_rejections(true)
                .on_unhandled(move |id, error| {
                    u.borrow_mut().push((id, error.message.clone()));
                    Ok(())
                })
                .on_handled(move |id, error| {
                    h.borrow_mut().push((id, error.message.clone()));
                    Ok(())
                }),
        );
        (unhandled, handled)
    }

    #[test]
    fn unhandled_rejection_is_reported_once_with_display_id_zero() {
        let (host, engine) = setup();
        let (unhandled, _) = enable_recording(&engine);

        let saved = Rc::new(RefCell::new(None));
        let slot = saved.clone();
        engine.new_promise(move |_, reject| {
            *slot.borrow_mut() = Some(reject.clone());
            reject.invoke(&[JsError::error("x").into()])
        });
        host.run_until_done().unwrap();

        let reject = saved.borrow_mut().take().unwrap();
        reject.invoke(&[JsError::error("again").into()]).unwrap();
        host.run_until_done().unwrap();

        assert_eq!(*unhandled.borrow(), vec![(0, "x".to_string())]);
    }

    #[test]
    fn late_catch_notifies_handled() {
        let (host, engine) = setup();
        let (unhandled, handled) = enable_recording(&engine);

        let promise = engine.reject(JsError::error("late").into());
        host.run_until_done().unwrap();
        promise.catch(Some(Function::unary(|_| Ok(Value::Undefined))));
        host.run_until_done().unwrap();

        assert_eq!(*unhandled.borrow(), vec![(0, "late".to_string())]);
        assert_eq!(*handled.borrow(), vec![(0, "late".to_string())]);
    }
}

mod finally_contract {
    use super::*;

    fn counting_callback(calls: &Rc<Cell<usize>>, arity: &Rc<Cell<usize>>) -> Function {
        let (calls, arity) = (calls.clone(), arity.clone());
        Function::new(move |_this, args| {
            calls.set(calls.get() + 1);
            arity.set(args.len());
            Ok(Value::Undefined)
        })
    }

    #[test]
    fn finally_runs_without_arguments_and_keeps_outcome() {
        let (host, engine) = setup();
        let calls = Rc::new(Cell::new(0));
        let arity = Rc::new(Cell::new(usize::MAX));

        let fulfilled = engine
            .resolve(Value::Smi(1))
            .finally(counting_callback(&calls, &arity));
        let rejected = engine
            .reject(Value::from("reason"))
            .finally(counting_callback(&calls, &arity));
        rejected.catch(Some(Function::unary(|_| Ok(Value::Undefined))));
        host.run_until_done().unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(arity.get(), 0);
        assert_eq!(fulfilled.outcome(), Some(Ok(Value::Smi(1))));
        assert_eq!(rejected.outcome(), Some(Err(Value::from("reason"))));
    }

    #[test]
    fn finally_failure_takes_precedence() {
        let (host, engine) = setup();
        let promise = engine
            .reject(Value::from("original"))
            .finally(Function::unary(|_| Err(Value::from("from finally"))));
        promise.catch(Some(Function::unary(|_| Ok(Value::Undefined))));
        host.run_until_done().unwrap();
        assert_eq!(promise.outcome(), Some(Err(Value::from("from finally"))));
    }
}
