//! The engine: what the host gets back from the promise factory.
//!
//! An [`Engine`] plays the role of the `Promise` constructor. It owns a
//! realm (the scheduler, the dispatch mode, the tracker hooks and the brand
//! that marks its promises) and exposes construction, the static
//! combinators and rejection tracking.

use crate::host::{HostOptions, HostScheduler, Job, StackCapture};
use crate::promise::{Executor, Promise, Species};
use crate::tracker::{RejectionTracker, TrackerOptions};
use core_types::{Completion, Function, JsError, StackFrame, Value};
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_BRAND: AtomicU64 = AtomicU64::new(0);

pub(crate) type HandleHook = Rc<dyn Fn(&Promise)>;
pub(crate) type RejectHook = Rc<dyn Fn(&Promise, &Value)>;

/// Integration points observed by the rejection tracker.
#[derive(Default, Clone)]
pub(crate) struct Hooks {
    pub(crate) on_handle: Option<HandleHook>,
    pub(crate) on_reject: Option<RejectHook>,
}

/// Per-engine state shared by every promise the engine creates.
pub(crate) struct Realm {
    brand: u64,
    scheduler: Rc<dyn HostScheduler>,
    microtasks: bool,
    builtin_then: Function,
    hooks: RefCell<Hooks>,
    capture_stack: Option<StackCapture>,
}

impl Realm {
    fn new(options: &HostOptions) -> Self {
        Self {
            brand: NEXT_BRAND.fetch_add(1, Ordering::Relaxed),
            scheduler: options.scheduler.clone(),
            microtasks: options.config.enable_microtask_promise_polyfill,
            builtin_then: builtin_then(),
            hooks: RefCell::new(Hooks::default()),
            capture_stack: options.capture_stack.clone(),
        }
    }

    pub(crate) fn scheduler(&self) -> &Rc<dyn HostScheduler> {
        &self.scheduler
    }

    pub(crate) fn builtin_then(&self) -> &Function {
        &self.builtin_then
    }

    /// Defers `job` to a later turn using the configured tick primitive.
    pub(crate) fn tick(&self, job: impl FnOnce() + 'static) {
        let job: Job = Box::new(move || {
            job();
            Ok(())
        });
        if self.microtasks {
            self.scheduler.next_tick(job);
        } else {
            self.scheduler.set_timeout(job, Duration::ZERO);
        }
    }

    #[track_caller]
    pub(crate) fn capture_trace(&self) -> Vec<StackFrame> {
        match &self.capture_stack {
            Some(capture) => capture(),
            None => vec![StackFrame::from_location(Location::caller())],
        }
    }

    /// Returns the promise behind `value` when it was created by this
    /// engine and `then` is still the built-in one.
    pub(crate) fn same_realm_promise(&self, value: &Value, then: &Value) -> Option<Promise> {
        let promise = Promise::from_value(value)?;
        let unmodified = then
            .as_function()
            .is_some_and(|then| then.ptr_eq(&self.builtin_then));
        (promise.realm().brand == self.brand && unmodified).then_some(promise)
    }

    pub(crate) fn is_own(&self, promise: &Promise) -> bool {
        promise.realm().brand == self.brand
    }

    pub(crate) fn install_hooks(&self, hooks: Hooks) {
        *self.hooks.borrow_mut() = hooks;
    }

    pub(crate) fn notify_handle(&self, promise: &Promise) {
        let hook = self.hooks.borrow().on_handle.clone();
        if let Some(hook) = hook {
            hook(promise);
        }
    }

    pub(crate) fn notify_reject(&self, promise: &Promise, reason: &Value) {
        let hook = self.hooks.borrow().on_reject.clone();
        if let Some(hook) = hook {
            hook(promise, reason);
        }
    }
}

/// `Promise.prototype.then` as a callable value. It holds no reference to
/// the realm; the receiver carries everything it needs.
fn builtin_then() -> Function {
    Function::new(|this, args| {
        let promise = Promise::from_value(this).ok_or_else(|| {
            Value::from(JsError::type_error(
                "Promise.prototype.then called on an incompatible receiver",
            ))
        })?;
        let handler = |index: usize| args.get(index).and_then(Value::as_function).cloned();
        Ok(promise.then(handler(0), handler(1)).to_value())
    })
}

/// Pre-settled promises for the literals `Promise.resolve` sees most.
struct LiteralPromises {
    true_: Promise,
    false_: Promise,
    null: Promise,
    undefined: Promise,
    zero: Promise,
    empty_string: Promise,
}

impl LiteralPromises {
    fn new(realm: &Rc<Realm>) -> Self {
        Self {
            true_: Promise::fulfilled(realm, Value::Boolean(true)),
            false_: Promise::fulfilled(realm, Value::Boolean(false)),
            null: Promise::fulfilled(realm, Value::Null),
            undefined: Promise::fulfilled(realm, Value::Undefined),
            zero: Promise::fulfilled(realm, Value::Smi(0)),
            empty_string: Promise::fulfilled(realm, Value::String(String::new())),
        }
    }

    fn lookup(&self, value: &Value) -> Option<&Promise> {
        match value {
            Value::Boolean(true) => Some(&self.true_),
            Value::Boolean(false) => Some(&self.false_),
            Value::Null => Some(&self.null),
            Value::Undefined => Some(&self.undefined),
            Value::Smi(0) => Some(&self.zero),
            Value::String(s) if s.is_empty() => Some(&self.empty_string),
            _ => None,
        }
    }
}

/// A promise engine instance, the counterpart of a `Promise` constructor.
///
/// Cloning an `Engine` clones a handle to the same realm.
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
/// let all = engine.all(&Value::array(vec![
///     Value::Smi(1),
///     engine.resolve(Value::Smi(2)).to_value(),
/// ]));
/// host.run_until_done().unwrap();
///
/// assert_eq!(all.outcome().unwrap().unwrap().to_string(), "1,2");
/// ```
#[derive(Clone)]
pub struct Engine {
    realm: Rc<Realm>,
    literals: Rc<LiteralPromises>,
}

impl Engine {
    /// Builds an engine against the host's scheduler.
    ///
    /// When the options carry an `on_unhandled` reporter, rejection tracking
    /// is enabled right away, reporting every rejection to it.
    pub fn new(options: HostOptions) -> Self {
        let realm = Rc::new(Realm::new(&options));
        let literals = Rc::new(LiteralPromises::new(&realm));
        let engine = Self { realm, literals };
        if let Some(report) = options.on_unhandled {
            let mut tracker = TrackerOptions::new().all_rejections(true);
            tracker.on_unhandled = Some(report);
            engine.enable(tracker);
        }
        engine
    }

    pub(crate) fn realm(&self) -> &Rc<Realm> {
        &self.realm
    }

    /// `new Promise(executor)`.
    ///
    /// Fails with a `TypeError` when `executor` is not callable; this is the
    /// only synchronous failure of construction. The executor is called
    /// with `this = undefined` and the resolve and reject functions.
    #[track_caller]
    pub fn construct(&self, executor: &Value) -> Result<Promise, JsError> {
        let Value::Function(executor) = executor else {
            return Err(JsError::type_error(
                "Promise constructor's argument is not a function",
            ));
        };
        let executor = executor.clone();
        let promise = Promise::unsettled(&self.realm, None);
        promise.do_resolve(move |resolve, reject| executor.invoke(&[resolve.into(), reject.into()]));
        Ok(promise)
    }

    /// `new Promise(executor)` with a Rust closure as the executor.
    ///
    /// Returning `Err` from the executor before it resolved or rejected
    /// rejects the promise with that value.
    #[track_caller]
    pub fn new_promise<F>(&self, executor: F) -> Promise
    where
        F: FnOnce(Function, Function) -> Completion,
    {
        let promise = Promise::unsettled(&self.realm, None);
        promise.do_resolve(executor);
        promise
    }

    /// Constructs a promise whose `then` results are built by `species`.
    #[track_caller]
    pub fn construct_with_species(&self, species: Rc<dyn Species>, executor: Executor) -> Promise {
        let promise = Promise::unsettled(&self.realm, Some(species));
        promise.do_resolve(executor);
        promise
    }

    pub(crate) fn literal(&self, value: &Value) -> Option<Promise> {
        self.literals.lookup(value).cloned()
    }

    /// `Promise.enable(options)`: starts rejection tracking.
    ///
    /// Enabling again replaces the previous tracker; timers the previous one
    /// armed are left to fire against it.
    pub fn enable(&self, options: TrackerOptions) {
        if self.is_tracking() {
            self.disable();
        }
        let tracker = RejectionTracker::new(self.realm.scheduler().clone(), options);
        self.realm.install_hooks(tracker.hooks());
        log::debug!("promise rejection tracking enabled");
    }

    /// `Promise.disable()`: stops rejection tracking.
    pub fn disable(&self) {
        self.realm.install_hooks(Hooks::default());
        log::debug!("promise rejection tracking disabled");
    }

    /// True while rejection tracking is enabled.
    pub fn is_tracking(&self) -> bool {
        let hooks = self.realm.hooks.borrow();
        hooks.on_handle.is_some() || hooks.on_reject.is_some()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("brand", &self.realm.brand)
            .field("microtasks", &self.realm.microtasks)
            .field("tracking", &self.is_tracking())
            .finish()
    }
}
