//! Static combinators and prototype sugar.
//!
//! `Promise.resolve`, `Promise.reject`, `Promise.all` and `Promise.race`
//! live on [`Engine`]; `catch`, `finally` and `done` live on [`Promise`].
//! All of them are built from the core `then` mechanics.

use crate::engine::{Engine, Realm};
use crate::promise::Promise;
use core_types::{Function, JsError, Value, ITERATOR_KEY};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

impl Engine {
    /// `Promise.resolve(value)`.
    ///
    /// Returns `value` itself when it is a promise of this engine. The
    /// literals `true`, `false`, `null`, `undefined`, `0` and `""` come from
    /// a cache of pre-fulfilled promises. Other thenables are adopted by
    /// calling their `then` right away; a throwing `then` getter yields a
    /// rejected promise.
    #[track_caller]
    pub fn resolve(&self, value: Value) -> Promise {
        if let Some(cached) = self.literal(&value) {
            return cached;
        }
        promise_resolve(self.realm(), value)
    }

    /// `Promise.reject(reason)`. The reason is used verbatim, even when it
    /// is a thenable.
    #[track_caller]
    pub fn reject(&self, reason: Value) -> Promise {
        let promise = Promise::unsettled(self.realm(), None);
        promise.reject_with(reason);
        promise
    }

    /// `Promise.all(iterable)`.
    ///
    /// Fulfills with an array holding every input's value at the input's
    /// index, once all inputs fulfilled. Rejects with the first rejection
    /// reason seen. Inputs that are not thenables count as fulfilled.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_engine::{Engine, EventLoop, HostOptions};
    /// use core_types::Value;
    /// use std::rc::Rc;
    ///
    /// let host = Rc::new(EventLoop::new());
    /// let engine = Engine::new(HostOptions::new(host.clone()));
    ///
    /// let empty = engine.all(&Value::array(vec![]));
    /// host.run_until_done().unwrap();
    /// assert_eq!(empty.outcome().unwrap().unwrap().to_string(), "");
    /// ```
    #[track_caller]
    pub fn all(&self, iterable: &Value) -> Promise {
        let iterable = iterable.clone();
        let realm = self.realm().clone();
        self.new_promise(move |resolve, reject| {
            let inputs = iterable_to_vec(&iterable)?;
            if inputs.is_empty() {
                return resolve.invoke(&[Value::array(Vec::new())]);
            }
            let state = Rc::new(AllState {
                realm,
                remaining: Cell::new(inputs.len()),
                results: RefCell::new(inputs.clone()),
                resolve,
                reject,
            });
            for (index, input) in inputs.into_iter().enumerate() {
                state.settle(index, input)?;
            }
            Ok(Value::Undefined)
        })
    }

    /// `Promise.race(iterable)`: settles like the first input that settles.
    #[track_caller]
    pub fn race(&self, iterable: &Value) -> Promise {
        let iterable = iterable.clone();
        let engine = self.clone();
        self.new_promise(move |resolve, reject| {
            for input in iterable_to_vec(&iterable)? {
                engine
                    .resolve(input)
                    .then(Some(resolve.clone()), Some(reject.clone()));
            }
            Ok(Value::Undefined)
        })
    }
}

/// `Promise.resolve` without the literal cache, for code that only holds a
/// realm.
#[track_caller]
fn promise_resolve(realm: &Rc<Realm>, value: Value) -> Promise {
    if let Some(own) = Promise::from_value(&value).filter(|p| realm.is_own(p)) {
        return own;
    }
    let then = match &value {
        Value::Object(object) => object.get("then"),
        _ => Ok(Value::Undefined),
    };
    match then {
        Ok(Value::Function(then)) => {
            let promise = Promise::unsettled(realm, None);
            promise.do_resolve(move |resolve, reject| {
                then.call(&value, &[resolve.into(), reject.into()])
            });
            promise
        }
        Ok(_) => Promise::fulfilled(realm, value),
        Err(thrown) => {
            let promise = Promise::unsettled(realm, None);
            promise.reject_with(thrown);
            promise
        }
    }
}

/// Bookkeeping of one `Promise.all` call.
struct AllState {
    realm: Rc<Realm>,
    remaining: Cell<usize>,
    results: RefCell<Vec<Value>>,
    resolve: Function,
    reject: Function,
}

impl AllState {
    fn settle(self: &Rc<Self>, index: usize, value: Value) -> Result<(), Value> {
        if let Value::Object(object) = &value {
            let then = object.get("then")?;
            if let Some(promise) = self.realm.same_realm_promise(&value, &then) {
                let inner = promise.innermost();
                match inner.settled() {
                    Some(Ok(fulfilled)) => return self.settle(index, fulfilled),
                    Some(Err(reason)) => {
                        self.reject.invoke(&[reason])?;
                    }
                    None => {}
                }
                // Also marks an already-rejected input as handled.
                inner.then(Some(self.fulfill_at(index)), Some(self.reject.clone()));
                return Ok(());
            }
            if let Value::Function(then) = then {
                let generic = Promise::unsettled(&self.realm, None);
                generic.do_resolve(|resolve, reject| {
                    then.call(&value, &[resolve.into(), reject.into()])
                });
                generic.then(Some(self.fulfill_at(index)), Some(self.reject.clone()));
                return Ok(());
            }
        }

        self.results.borrow_mut()[index] = value;
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);
        if remaining == 0 {
            let results = std::mem::take(&mut *self.results.borrow_mut());
            self.resolve.invoke(&[Value::array(results)])?;
        }
        Ok(())
    }

    fn fulfill_at(self: &Rc<Self>, index: usize) -> Function {
        let state = self.clone();
        Function::unary(move |value| {
            state.settle(index, value)?;
            Ok(Value::Undefined)
        })
    }
}

/// Materializes an iterable or array-like into a vector.
///
/// Arrays and strings are taken as they are. Objects are iterated through
/// their `@@iterator` method when they have one, and read as array-likes
/// through `length` otherwise.
pub(crate) fn iterable_to_vec(iterable: &Value) -> Result<Vec<Value>, Value> {
    match iterable {
        Value::Array(items) => return Ok(items.borrow().clone()),
        Value::String(s) => return Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        _ => {}
    }

    if let Value::Function(factory) = iterable.get(ITERATOR_KEY)? {
        let iterator = factory.call(iterable, &[])?;
        let Value::Function(next) = iterator.get("next")? else {
            return Err(JsError::type_error("iterator.next is not a function").into());
        };
        let mut items = Vec::new();
        loop {
            let step = next.call(&iterator, &[])?;
            if !step.is_object_like() {
                return Err(JsError::type_error(format!(
                    "Iterator result {} is not an object",
                    step
                ))
                .into());
            }
            if step.get("done")?.is_truthy() {
                return Ok(items);
            }
            items.push(step.get("value")?);
        }
    }

    if let Some(length) = iterable.get("length")?.as_number() {
        let length = if length.is_nan() || length <= 0.0 {
            0
        } else if length > f64::from(u32::MAX) {
            return Err(JsError::range_error("Invalid array length").into());
        } else {
            length as usize
        };
        return (0..length)
            .map(|index| iterable.get(&index.to_string()))
            .collect();
    }

    Err(JsError::type_error(format!("{} is not iterable", iterable.type_of())).into())
}

impl Promise {
    /// `promise.catch(onRejected)`, i.e. `then(None, on_rejected)`.
    #[track_caller]
    pub fn catch(&self, on_rejected: Option<Function>) -> Promise {
        self.then(None, on_rejected)
    }

    /// `promise.finally(onFinally)`.
    ///
    /// `on_finally` runs with no arguments on either outcome. Once whatever
    /// it returned has settled, the original value or reason comes through
    /// unchanged, unless `on_finally` threw or returned a rejected promise.
    #[track_caller]
    pub fn finally(&self, on_finally: Function) -> Promise {
        let realm = self.realm().clone();
        let after_fulfilled = {
            let realm = realm.clone();
            let on_finally = on_finally.clone();
            Function::unary(move |value| {
                let settled = promise_resolve(&realm, on_finally.invoke(&[])?);
                let passthrough = Function::unary(move |_| Ok(value.clone()));
                Ok(settled.then(Some(passthrough), None).to_value())
            })
        };
        let after_rejected = Function::unary(move |reason| {
            let settled = promise_resolve(&realm, on_finally.invoke(&[])?);
            let rethrow = Function::unary(move |_| Err(reason.clone()));
            Ok(settled.then(Some(rethrow), None).to_value())
        });
        self.then(Some(after_fulfilled), Some(after_rejected))
    }

    /// `promise.done(onFulfilled, onRejected)`.
    ///
    /// Like `then`, but ends the chain: a rejection nobody handled is thrown
    /// to the host from a zero-delay timer. With no handlers the rethrow is
    /// attached to this promise directly.
    pub fn done(&self, on_fulfilled: Option<Function>, on_rejected: Option<Function>) {
        let tail = if on_fulfilled.is_none() && on_rejected.is_none() {
            self.clone()
        } else {
            self.then(on_fulfilled, on_rejected)
        };
        let scheduler = self.realm().scheduler().clone();
        tail.then(
            None,
            Some(Function::unary(move |reason| {
                scheduler.set_timeout(Box::new(move || Err(reason)), Duration::ZERO);
                Ok(Value::Undefined)
            })),
        );
    }
}
