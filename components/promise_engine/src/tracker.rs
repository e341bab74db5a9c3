//! Unhandled-rejection tracking.
//!
//! The tracker watches two engine hooks. When a promise rejects while no
//! handler was ever attached to it, a zero-delay grace timer is armed; a
//! handler attached before the timer fires cancels the report. When the
//! timer fires the rejection is reported (subject to the whitelist). A
//! handler attached after that produces a "handled after all" notice.
//! Rejections the whitelist skips are forgotten when their timer fires.

use crate::engine::Hooks;
use crate::host::{HostScheduler, TimerId};
use crate::promise::{DeferredState, Promise, PromiseState};
use core_types::{ErrorKind, JsError, SourcePosition, StackFrame, Value};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Reporting callback: `(display_id, error)`.
///
/// An `Err` returned from `on_unhandled` propagates out of the grace timer
/// to the host. An `Err` returned from `on_handled` is rethrown on a
/// zero-delay host timer, since the notice fires inside `then`.
pub type ReportFn = Rc<dyn Fn(u64, &JsError) -> Result<(), Value>>;

/// Which rejections get reported.
///
/// # Examples
///
/// ```
/// use promise_engine::RejectionPolicy;
/// use core_types::ErrorKind;
///
/// let policy: RejectionPolicy = serde_json::from_str(r#"{ "whitelist": ["TypeError"] }"#).unwrap();
/// assert!(!policy.all_rejections);
/// assert_eq!(policy.whitelist, Some(vec![ErrorKind::TypeError]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectionPolicy {
    /// Report every unhandled rejection regardless of its reason.
    pub all_rejections: bool,
    /// Error kinds worth reporting; `None` means [`DEFAULT_WHITELIST`].
    pub whitelist: Option<Vec<ErrorKind>>,
}

/// Error kinds reported when no whitelist is configured. These almost
/// always indicate a programming mistake.
pub const DEFAULT_WHITELIST: [ErrorKind; 3] = [
    ErrorKind::ReferenceError,
    ErrorKind::TypeError,
    ErrorKind::RangeError,
];

impl RejectionPolicy {
    /// Whether a rejection with `reason` should be reported.
    pub fn should_report(&self, reason: &Value) -> bool {
        if self.all_rejections {
            return true;
        }
        let Some(error) = reason.as_error() else {
            return false;
        };
        match &self.whitelist {
            Some(kinds) => kinds.contains(&error.kind),
            None => DEFAULT_WHITELIST.contains(&error.kind),
        }
    }
}

/// Options for [`Engine::enable`](crate::Engine::enable).
#[derive(Clone, Default)]
pub struct TrackerOptions {
    /// Reporting filter
    pub policy: RejectionPolicy,
    /// Called for each reported rejection; defaults to a `log::warn!` dump
    pub on_unhandled: Option<ReportFn>,
    /// Called when a reported rejection later gets a handler; defaults to a
    /// `log::warn!` notice
    pub on_handled: Option<ReportFn>,
}

impl TrackerOptions {
    /// Default options: whitelist filtering, logging reporters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the reporting filter.
    pub fn with_policy(mut self, policy: RejectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report every rejection, not just whitelisted error kinds.
    pub fn all_rejections(mut self, all: bool) -> Self {
        self.policy.all_rejections = all;
        self
    }

    /// Restricts reporting to rejections with these error kinds.
    pub fn whitelist(mut self, kinds: Vec<ErrorKind>) -> Self {
        self.policy.whitelist = Some(kinds);
        self
    }

    /// Sets the unhandled-rejection reporter.
    pub fn on_unhandled<F>(mut self, report: F) -> Self
    where
        F: Fn(u64, &JsError) -> Result<(), Value> + 'static,
    {
        self.on_unhandled = Some(Rc::new(report));
        self
    }

    /// Sets the handled-after-report notifier.
    pub fn on_handled<F>(mut self, report: F) -> Self
    where
        F: Fn(u64, &JsError) -> Result<(), Value> + 'static,
    {
        self.on_handled = Some(Rc::new(report));
        self
    }
}

impl fmt::Debug for TrackerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerOptions")
            .field("policy", &self.policy)
            .field("on_unhandled", &self.on_unhandled.is_some())
            .field("on_handled", &self.on_handled.is_some())
            .finish()
    }
}

struct RejectionRecord {
    display_id: Option<u64>,
    error: Value,
    trace: Vec<StackFrame>,
    timer: TimerId,
    logged: bool,
    reported: Option<JsError>,
}

#[derive(Default)]
struct TrackerState {
    next_id: u64,
    next_display_id: u64,
    rejections: HashMap<u64, RejectionRecord>,
}

/// One enabled tracking session. Counters live here, so two engines (or
/// two `enable` calls) never share ids.
pub(crate) struct RejectionTracker {
    scheduler: Rc<dyn HostScheduler>,
    options: TrackerOptions,
    state: RefCell<TrackerState>,
}

impl RejectionTracker {
    pub(crate) fn new(scheduler: Rc<dyn HostScheduler>, options: TrackerOptions) -> Rc<Self> {
        Rc::new(Self {
            scheduler,
            options,
            state: RefCell::new(TrackerState::default()),
        })
    }

    /// The engine hooks that feed this tracker.
    pub(crate) fn hooks(self: &Rc<Self>) -> Hooks {
        let on_handle = self.clone();
        let on_reject = self.clone();
        Hooks {
            on_handle: Some(Rc::new(move |promise: &Promise| on_handle.on_handle(promise))),
            on_reject: Some(Rc::new(move |promise: &Promise, reason: &Value| {
                on_reject.on_reject(promise, reason)
            })),
        }
    }

    fn on_reject(self: &Rc<Self>, promise: &Promise, reason: &Value) {
        if promise.deferred_state() != DeferredState::None {
            return;
        }
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            id
        };
        promise.set_rejection_id(id);

        let tracker = self.clone();
        let timer = self
            .scheduler
            .set_timeout(Box::new(move || tracker.on_unhandled(id)), Duration::ZERO);
        log::trace!("rejection {} has no handler yet, grace timer armed", id);

        self.state.borrow_mut().rejections.insert(
            id,
            RejectionRecord {
                display_id: None,
                error: reason.clone(),
                trace: promise.creation_trace().to_vec(),
                timer,
                logged: false,
                reported: None,
            },
        );
    }

    fn on_handle(&self, promise: &Promise) {
        if promise.state() != PromiseState::Rejected {
            return;
        }
        let Some(id) = promise.rejection_id() else {
            return;
        };
        let Some(record) = self.state.borrow_mut().rejections.remove(&id) else {
            return;
        };
        if !record.logged {
            self.scheduler.clear_timeout(record.timer);
            return;
        }
        let (Some(display_id), Some(error)) = (record.display_id, record.reported) else {
            return;
        };
        match &self.options.on_handled {
            Some(report) => {
                if let Err(thrown) = report(display_id, &error) {
                    self.scheduler
                        .set_timeout(Box::new(move || Err(thrown)), Duration::ZERO);
                }
            }
            None => {
                log::warn!("Promise Rejection Handled (id: {}):", display_id);
                log::warn!(
                    "  This means you can ignore any previous messages of the form \"Possible Unhandled Promise Rejection\" with id {}.",
                    display_id
                );
            }
        }
    }

    fn on_unhandled(&self, id: u64) -> Result<(), Value> {
        let (display_id, error) = {
            let mut state = self.state.borrow_mut();
            let TrackerState {
                next_display_id,
                rejections,
                ..
            } = &mut *state;
            let Some(record) = rejections.get_mut(&id) else {
                return Ok(());
            };
            if !self.options.policy.should_report(&record.error) {
                rejections.remove(&id);
                return Ok(());
            }
            let display_id = *next_display_id;
            *next_display_id += 1;
            let error = error_for_report(&record.error, &record.trace);
            record.display_id = Some(display_id);
            record.logged = true;
            record.reported = Some(error.clone());
            (display_id, error)
        };

        match &self.options.on_unhandled {
            Some(report) => report(display_id, &error),
            None => {
                log_unhandled(display_id, &error);
                Ok(())
            }
        }
    }
}

/// The error handed to reporters. Non-Error reasons get a synthesized
/// Error carrying the rejected promise's creation trace, positioned at its
/// top frame.
fn error_for_report(reason: &Value, trace: &[StackFrame]) -> JsError {
    match reason.as_error() {
        Some(error) => error.clone(),
        None => {
            let mut error = JsError::error(reason.to_string()).with_stack(trace.to_vec());
            error.source_position = trace.first().map(SourcePosition::from);
            error
        }
    }
}

fn log_unhandled(display_id: u64, error: &JsError) {
    log::warn!("Possible Unhandled Promise Rejection (id: {}):", display_id);
    for line in error.format_stack().lines() {
        log::warn!("  {}", line);
    }
}
