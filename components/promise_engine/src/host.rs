//! The host side of the engine.
//!
//! The engine never owns a clock or a queue. Everything asynchronous is
//! handed to a [`HostScheduler`] supplied at construction through
//! [`HostOptions`].

use crate::tracker::ReportFn;
use core_types::{StackFrame, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// A unit of deferred work. `Err` carries an uncaught exception that the
/// host is expected to surface.
pub type Job = Box<dyn FnOnce() -> Result<(), Value>>;

/// Captures the current script call stack for promise creation traces.
pub type StackCapture = Rc<dyn Fn() -> Vec<StackFrame>>;

/// Handle of a pending timer, returned by [`HostScheduler::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

/// Timers and a tick primitive provided by the embedder.
///
/// Implementations must never run a callback synchronously from inside
/// `set_timeout` or `next_tick`.
pub trait HostScheduler {
    /// Runs `callback` once `delay` has elapsed.
    fn set_timeout(&self, callback: Job, delay: Duration) -> TimerId;

    /// Cancels a timer. Unknown or already-fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);

    /// Runs `job` on the microtask queue.
    fn next_tick(&self, job: Job);
}

/// Serializable engine settings.
///
/// # Examples
///
/// ```
/// use promise_engine::EngineConfig;
///
/// let config: EngineConfig =
///     serde_json::from_str(r#"{ "enable_microtask_promise_polyfill": false }"#).unwrap();
/// assert!(!config.enable_microtask_promise_polyfill);
/// assert!(EngineConfig::default().enable_microtask_promise_polyfill);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Dispatch handlers through [`HostScheduler::next_tick`] when true,
    /// through a zero-delay timer otherwise.
    pub enable_microtask_promise_polyfill: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_microtask_promise_polyfill: true,
        }
    }
}

/// Everything the engine factory needs from its host.
#[derive(Clone)]
pub struct HostOptions {
    /// Timer and tick provider
    pub scheduler: Rc<dyn HostScheduler>,
    /// Engine settings
    pub config: EngineConfig,
    /// When set, rejection tracking is enabled at construction and every
    /// unhandled rejection is reported here
    pub on_unhandled: Option<ReportFn>,
    /// Script stack provider for creation traces
    pub capture_stack: Option<StackCapture>,
}

impl HostOptions {
    /// Options with default settings and no reporting callback.
    pub fn new(scheduler: Rc<dyn HostScheduler>) -> Self {
        Self {
            scheduler,
            config: EngineConfig::default(),
            on_unhandled: None,
            capture_stack: None,
        }
    }

    /// Replaces the engine settings.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Selects microtask (true) or zero-delay timer (false) dispatch.
    pub fn microtasks(mut self, enabled: bool) -> Self {
        self.config.enable_microtask_promise_polyfill = enabled;
        self
    }

    /// Installs a factory-level unhandled-rejection reporter.
    pub fn on_unhandled<F>(mut self, report: F) -> Self
    where
        F: Fn(u64, &core_types::JsError) -> Result<(), Value> + 'static,
    {
        self.on_unhandled = Some(Rc::new(report));
        self
    }

    /// Installs a script stack provider.
    pub fn capture_stack<F>(mut self, capture: F) -> Self
    where
        F: Fn() -> Vec<StackFrame> + 'static,
    {
        self.capture_stack = Some(Rc::new(capture));
        self
    }
}

impl fmt::Debug for HostOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostOptions")
            .field("config", &self.config)
            .field("on_unhandled", &self.on_unhandled.is_some())
            .field("capture_stack", &self.capture_stack.is_some())
            .finish_non_exhaustive()
    }
}
