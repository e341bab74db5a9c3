//! Promise implementation following the Promise/A+ specification.
//!
//! A [`Promise`] is a shared handle to a single-threaded state machine:
//!
//! - `Pending` buffers handler records until it settles
//! - `Fulfilled` / `Rejected` hold the frozen value or reason
//! - `Adopted` defers to another promise of the same engine; handlers
//!   attached to an adopting promise are forwarded to the innermost one
//!
//! Handlers never run in the turn they are attached: every dispatch goes
//! through the engine's tick primitive.

use crate::engine::Realm;
use core_types::{Completion, Function, JsError, JsObject, StackFrame, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// The state of a Promise.
///
/// Once a promise leaves `Pending` it never changes again, except that an
/// `Adopted` promise reports the settlement of the promise it adopted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// Neither fulfilled nor rejected yet.
    Pending,
    /// Resolved with a value.
    Fulfilled,
    /// Rejected with a reason.
    Rejected,
    /// Deferring to another promise of the same engine.
    Adopted,
}

/// How many handlers a promise has buffered over its lifetime.
///
/// Escalates `None -> Single -> Many` and never goes back, even after the
/// buffered handlers have been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeferredState {
    /// No handler was ever buffered.
    None,
    /// Exactly one handler was buffered.
    Single,
    /// Two or more handlers were buffered.
    Many,
}

/// Executor handed to a [`Species`] constructor. It must be called exactly
/// once, synchronously, with the new promise's resolve and reject functions.
pub type Executor = Box<dyn FnOnce(Function, Function) -> Completion>;

/// A promise subclass constructor.
///
/// `then` on a promise carrying a species builds its result through
/// [`Species::construct`], so chains keep producing the subclass.
/// Implementations normally do their own bookkeeping and then call
/// [`Engine::construct_with_species`] with themselves.
///
/// [`Engine::construct_with_species`]: crate::Engine::construct_with_species
pub trait Species {
    /// Builds a new promise driven by `executor`.
    fn construct(self: Rc<Self>, executor: Executor) -> Promise;
}

/// A reaction to be triggered when a Promise settles.
///
/// This is the record registered by `.then()`: the optional branch
/// handlers and the promise `.then()` returned.
pub(crate) struct PromiseReaction {
    on_fulfilled: Option<Function>,
    on_rejected: Option<Function>,
    promise: Promise,
}

impl PromiseReaction {
    pub(crate) fn new(
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
        promise: Promise,
    ) -> Self {
        Self {
            on_fulfilled,
            on_rejected,
            promise,
        }
    }
}

enum Slot {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
    Adopted(Promise),
}

#[derive(Default)]
enum Deferreds {
    #[default]
    Empty,
    Single(PromiseReaction),
    Many(Vec<PromiseReaction>),
}

pub(crate) struct PromiseCell {
    realm: Rc<Realm>,
    species: Option<Rc<dyn Species>>,
    state: RefCell<Slot>,
    deferred_state: Cell<DeferredState>,
    deferreds: RefCell<Deferreds>,
    rejection_id: Cell<Option<u64>>,
    creation_trace: Vec<StackFrame>,
    then_override: RefCell<Option<Value>>,
}

/// A JavaScript Promise.
///
/// Cloning a `Promise` clones the handle; both clones observe the same
/// state.
///
/// # Examples
///
/// ```
/// use promise_engine::{Engine, EventLoop, HostOptions};
/// use core_types::{Function, Value};
/// use std::rc::Rc;
///
/// let host = Rc::new(EventLoop::new());
/// let engine = Engine::new(HostOptions::new(host.clone()));
///
/// let promise = engine
///     .new_promise(|resolve, _reject| resolve.invoke(&[Value::Smi(42)]))
///     .then(
///         Some(Function::unary(|v| match v {
///             Value::Smi(n) => Ok(Value::Smi(n + 1)),
///             other => Ok(other),
///         })),
///         None,
///     );
///
/// host.run_until_done().unwrap();
/// assert_eq!(promise.outcome(), Some(Ok(Value::Smi(43))));
/// ```
#[derive(Clone)]
pub struct Promise(pub(crate) Rc<PromiseCell>);

impl Promise {
    /// A pending promise that runs no user code (the receiver of a `then`
    /// result, or a promise settled by engine internals).
    #[track_caller]
    pub(crate) fn unsettled(realm: &Rc<Realm>, species: Option<Rc<dyn Species>>) -> Promise {
        let creation_trace = realm.capture_trace();
        Promise(Rc::new(PromiseCell {
            realm: realm.clone(),
            species,
            state: RefCell::new(Slot::Pending),
            deferred_state: Cell::new(DeferredState::None),
            deferreds: RefCell::new(Deferreds::Empty),
            rejection_id: Cell::new(None),
            creation_trace,
            then_override: RefCell::new(None),
        }))
    }

    /// A promise born fulfilled. No hooks fire and nothing is dispatched.
    #[track_caller]
    pub(crate) fn fulfilled(realm: &Rc<Realm>, value: Value) -> Promise {
        let promise = Promise::unsettled(realm, None);
        *promise.0.state.borrow_mut() = Slot::Fulfilled(value);
        promise
    }

    /// Wraps the promise into a [`Value`] (an object whose `then` is the
    /// engine's built-in `then`).
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Recovers the promise behind a value, whichever engine created it.
    pub fn from_value(value: &Value) -> Option<Promise> {
        match value {
            Value::Object(object) => object.clone().into_any().downcast::<PromiseCell>().ok().map(Promise),
            _ => None,
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The raw state of this promise (not following adoption).
    pub fn state(&self) -> PromiseState {
        match &*self.0.state.borrow() {
            Slot::Pending => PromiseState::Pending,
            Slot::Fulfilled(_) => PromiseState::Fulfilled,
            Slot::Rejected(_) => PromiseState::Rejected,
            Slot::Adopted(_) => PromiseState::Adopted,
        }
    }

    /// The settlement of this promise, following adoption: `Some(Ok(value))`
    /// once fulfilled, `Some(Err(reason))` once rejected, `None` while
    /// pending.
    pub fn outcome(&self) -> Option<Completion> {
        self.innermost().settled()
    }

    /// Buffered-handler escalation state.
    pub fn deferred_state(&self) -> DeferredState {
        self.0.deferred_state.get()
    }

    /// Where this promise was created.
    pub fn creation_trace(&self) -> &[StackFrame] {
        &self.0.creation_trace
    }

    /// True when `then` builds results through a subclass constructor.
    pub fn has_species(&self) -> bool {
        self.0.species.is_some()
    }

    /// Overwrites the `then` property seen by thenable detection. A promise
    /// with an overridden `then` is treated as a generic thenable.
    pub fn set_then(&self, then: Value) {
        *self.0.then_override.borrow_mut() = Some(then);
    }

    pub(crate) fn realm(&self) -> &Rc<Realm> {
        &self.0.realm
    }

    pub(crate) fn rejection_id(&self) -> Option<u64> {
        self.0.rejection_id.get()
    }

    pub(crate) fn set_rejection_id(&self, id: u64) {
        self.0.rejection_id.set(Some(id));
    }

    /// Value or reason of a settled promise; `None` while pending or adopted.
    pub(crate) fn settled(&self) -> Option<Completion> {
        match &*self.0.state.borrow() {
            Slot::Fulfilled(value) => Some(Ok(value.clone())),
            Slot::Rejected(reason) => Some(Err(reason.clone())),
            Slot::Pending | Slot::Adopted(_) => None,
        }
    }

    /// Walks a chain of adopted promises to the one holding the real state.
    pub(crate) fn innermost(&self) -> Promise {
        let mut current = self.clone();
        loop {
            let next = match &*current.0.state.borrow() {
                Slot::Adopted(inner) => inner.clone(),
                _ => break,
            };
            current = next;
        }
        current
    }

    /// Appends handlers for fulfillment and/or rejection.
    ///
    /// Returns the promise that settles with the handler's return value (or
    /// rejects with what it throws). A missing handler passes the value or
    /// reason through unchanged.
    #[track_caller]
    pub fn then(&self, on_fulfilled: Option<Function>, on_rejected: Option<Function>) -> Promise {
        if let Some(species) = self.0.species.clone() {
            return self.safe_then(species, on_fulfilled, on_rejected);
        }
        let child = Promise::unsettled(&self.0.realm, None);
        self.handle(PromiseReaction::new(on_fulfilled, on_rejected, child.clone()));
        child
    }

    fn safe_then(
        &self,
        species: Rc<dyn Species>,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
    ) -> Promise {
        let this = self.clone();
        species.construct(Box::new(move |resolve, reject| {
            let relay = Promise::unsettled(&this.0.realm, None);
            relay.then(Some(resolve), Some(reject));
            this.handle(PromiseReaction::new(on_fulfilled, on_rejected, relay));
            Ok(Value::Undefined)
        }))
    }

    pub(crate) fn handle(&self, reaction: PromiseReaction) {
        let target = self.innermost();
        target.0.realm.notify_handle(&target);
        if matches!(*target.0.state.borrow(), Slot::Pending) {
            target.defer(reaction);
            return;
        }
        target.handle_resolved(reaction);
    }

    fn defer(&self, reaction: PromiseReaction) {
        let mut deferreds = self.0.deferreds.borrow_mut();
        *deferreds = match std::mem::take(&mut *deferreds) {
            Deferreds::Empty => Deferreds::Single(reaction),
            Deferreds::Single(first) => Deferreds::Many(vec![first, reaction]),
            Deferreds::Many(mut all) => {
                all.push(reaction);
                Deferreds::Many(all)
            }
        };
        let escalated = match &*deferreds {
            Deferreds::Many(_) => DeferredState::Many,
            _ => DeferredState::Single,
        };
        self.0
            .deferred_state
            .set(self.0.deferred_state.get().max(escalated));
    }

    fn handle_resolved(&self, reaction: PromiseReaction) {
        let settled = self.clone();
        self.0.realm.tick(move || {
            let Some(outcome) = settled.settled() else {
                return;
            };
            let PromiseReaction {
                on_fulfilled,
                on_rejected,
                promise: child,
            } = reaction;
            let (handler, argument) = match outcome {
                Ok(value) => (on_fulfilled, Ok(value)),
                Err(reason) => (on_rejected, Err(reason)),
            };
            match (handler, argument) {
                (None, Ok(value)) => child.resolve_with(value),
                (None, Err(reason)) => child.reject_with(reason),
                (Some(handler), Ok(argument) | Err(argument)) => {
                    match handler.invoke(&[argument]) {
                        Ok(returned) => child.resolve_with(returned),
                        Err(thrown) => child.reject_with(thrown),
                    }
                }
            }
        });
    }

    /// The Promise Resolution Procedure.
    pub(crate) fn resolve_with(&self, value: Value) {
        if Promise::from_value(&value).is_some_and(|other| other.ptr_eq(self)) {
            let error = JsError::type_error("A promise cannot be resolved with itself.");
            return self.reject_with(error.into());
        }
        if let Value::Object(object) = &value {
            let then = match object.get("then") {
                Ok(then) => then,
                Err(thrown) => return self.reject_with(thrown),
            };
            if let Some(inner) = self.0.realm.same_realm_promise(&value, &then) {
                // `self` is still pending, so the walk ends at it when the
                // chain leads back here.
                if inner.innermost().ptr_eq(self) {
                    let error = JsError::type_error("Chaining cycle detected for promise.");
                    return self.reject_with(error.into());
                }
                *self.0.state.borrow_mut() = Slot::Adopted(inner);
                self.finale();
                return;
            }
            if let Value::Function(then) = then {
                let target = self.clone();
                let thenable = value.clone();
                self.0.realm.tick(move || {
                    target.do_resolve(move |resolve, reject| {
                        then.call(&thenable, &[resolve.into(), reject.into()])
                    });
                });
                return;
            }
        }
        *self.0.state.borrow_mut() = Slot::Fulfilled(value);
        self.finale();
    }

    pub(crate) fn reject_with(&self, reason: Value) {
        *self.0.state.borrow_mut() = Slot::Rejected(reason.clone());
        self.0.realm.notify_reject(self, &reason);
        self.finale();
    }

    fn finale(&self) {
        let deferreds = std::mem::take(&mut *self.0.deferreds.borrow_mut());
        match deferreds {
            Deferreds::Empty => {}
            Deferreds::Single(reaction) => self.handle(reaction),
            Deferreds::Many(reactions) => {
                for reaction in reactions {
                    self.handle(reaction);
                }
            }
        }
    }

    /// Runs a possibly misbehaving resolver so that only the first call to
    /// either of its callbacks counts. A throw before that settles the
    /// promise as rejected.
    pub(crate) fn do_resolve<F>(&self, executor: F)
    where
        F: FnOnce(Function, Function) -> Completion,
    {
        let done = Rc::new(Cell::new(false));
        let resolve = {
            let done = done.clone();
            let promise = self.clone();
            Function::unary(move |value| {
                if !done.replace(true) {
                    promise.resolve_with(value);
                }
                Ok(Value::Undefined)
            })
        };
        let reject = {
            let done = done.clone();
            let promise = self.clone();
            Function::unary(move |reason| {
                if !done.replace(true) {
                    promise.reject_with(reason);
                }
                Ok(Value::Undefined)
            })
        };
        if let Err(thrown) = executor(resolve, reject) {
            if !done.replace(true) {
                self.reject_with(thrown);
            }
        }
    }
}

impl JsObject for PromiseCell {
    fn get(&self, key: &str) -> Completion {
        match key {
            "then" => Ok(self
                .then_override
                .borrow()
                .clone()
                .unwrap_or_else(|| Value::Function(self.realm.builtin_then().clone()))),
            _ => Ok(Value::Undefined),
        }
    }

    fn class_name(&self) -> &'static str {
        "Promise"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Promise");
        debug.field("state", &self.state());
        if let Some(outcome) = self.settled() {
            debug.field("outcome", &outcome);
        }
        debug.field("deferred_state", &self.deferred_state()).finish()
    }
}
