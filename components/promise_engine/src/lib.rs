//! Promise engine for embedding in a JavaScript-style host.
//!
//! This crate provides:
//! - A Promise/A+ core with same-engine adoption and subclass construction
//! - The ES2015 combinators (`resolve`, `reject`, `all`, `race`) and the
//!   `catch` / `finally` / `done` sugar
//! - Unhandled-rejection tracking with a grace period
//! - A deterministic reference host ([`EventLoop`]) for tests and simple
//!   embedders
//!
//! # Overview
//!
//! - [`Engine`] - The `Promise` constructor: construction, combinators and
//!   tracking
//! - [`Promise`] - A shared handle to one promise
//! - [`HostScheduler`] - Timers and the tick primitive the host provides
//! - [`EventLoop`] - Virtual-clock implementation of [`HostScheduler`]
//! - [`TrackerOptions`] / [`RejectionPolicy`] - Rejection tracking settings
//!
//! # Examples
//!
//! ## Chaining
//!
//! ```
//! use promise_engine::{Engine, EventLoop, HostOptions};
//! use core_types::{Function, Value};
//! use std::rc::Rc;
//!
//! let host = Rc::new(EventLoop::new());
//! let engine = Engine::new(HostOptions::new(host.clone()));
//!
//! let doubled = engine
//!     .resolve(Value::Smi(21))
//!     .then(Some(Function::unary(|v| Ok(Value::Smi(v.as_number().unwrap() as i32 * 2)))), None);
//!
//! host.run_until_done().unwrap();
//! assert_eq!(doubled.outcome(), Some(Ok(Value::Smi(42))));
//! ```
//!
//! ## Rejection Tracking
//!
//! ```
//! use promise_engine::{Engine, EventLoop, HostOptions, TrackerOptions};
//! use core_types::{JsError, Value};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let host = Rc::new(EventLoop::new());
//! let engine = Engine::new(HostOptions::new(host.clone()));
//!
//! let reports = Rc::new(RefCell::new(Vec::new()));
//! let sink = reports.clone();
//! engine.enable(TrackerOptions::new().on_unhandled(move |id, error| {
//!     sink.borrow_mut().push((id, error.message.clone()));
//!     Ok(())
//! }));
//!
//! engine.reject(JsError::type_error("oops").into());
//! host.run_until_done().unwrap();
//! assert_eq!(*reports.borrow(), vec![(0, "oops".to_string())]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod combinators;
pub mod engine;
pub mod event_loop;
pub mod host;
pub mod promise;
pub mod task_queue;
pub mod tracker;

// Re-export main types at crate root
pub use engine::Engine;
pub use event_loop::EventLoop;
pub use host::{EngineConfig, HostOptions, HostScheduler, Job, StackCapture, TimerId};
pub use promise::{DeferredState, Executor, Promise, PromiseState, Species};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
pub use tracker::{RejectionPolicy, ReportFn, TrackerOptions, DEFAULT_WHITELIST};
