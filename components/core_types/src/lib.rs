//! Core value types and error handling for the promise engine.
//!
//! This crate provides the value model that promises carry and that host
//! code hands to the engine: tagged values, callable functions, objects
//! with fallible property access, and JavaScript-style errors with stack
//! traces.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of JavaScript values
//! - [`Function`] - Shared callable receiving `this` and an argument list
//! - [`JsObject`] - Objects whose property reads may throw
//! - [`PlainObject`] - Ordinary property bag (data and getter properties)
//! - [`JsError`] - JavaScript errors with stack traces
//! - [`ErrorKind`] - Types of JavaScript errors
//! - [`SourcePosition`] / [`StackFrame`] - Source location tracking
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, Function, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let double = Function::unary(|v| match v {
//!     Value::Smi(n) => Ok(Value::Smi(n * 2)),
//!     other => Err(JsError::type_error(format!("{} is not a small integer", other)).into()),
//! });
//! assert_eq!(double.invoke(&[Value::Smi(21)]), Ok(Value::Smi(42)));
//!
//! let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
//! assert_eq!(error.to_string(), "TypeError: undefined is not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod function;
mod object;
mod source;
mod value;

pub use error::{ErrorKind, JsError};
pub use function::{Completion, Function};
pub use object::{JsObject, PlainObject, Property, ITERATOR_KEY};
pub use source::{SourcePosition, StackFrame};
pub use value::Value;
