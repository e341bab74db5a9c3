//! JavaScript error types and error handling.
//!
//! This module provides error types that correspond to JavaScript's built-in
//! error constructors, along with stack trace information. A rejected
//! promise whose reason is a [`JsError`] counts as an `Error` instance for
//! rejection-tracking purposes.

use crate::{SourcePosition, StackFrame};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of JavaScript error.
///
/// These correspond to JavaScript's built-in error constructors. They
/// (de)serialize by constructor name, e.g. `"TypeError"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Generic Error
    Error,
    /// Syntax error in JavaScript code
    SyntaxError,
    /// Type error (e.g., calling a non-function)
    TypeError,
    /// Reference to an undefined variable
    ReferenceError,
    /// Value out of allowed range
    RangeError,
    /// Error in eval() function
    EvalError,
    /// Error in URI handling functions
    URIError,
    /// Internal engine error
    InternalError,
}

impl ErrorKind {
    /// Returns the constructor name of this error kind.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::URIError => "URIError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JavaScript error with message and stack trace.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError, StackFrame};
///
/// let error = JsError::type_error("undefined is not a function").with_stack(vec![StackFrame {
///     function_name: Some("main".to_string()),
///     source_url: Some("app.js".to_string()),
///     line: 4,
///     column: 2,
/// }]);
///
/// assert_eq!(error.kind, ErrorKind::TypeError);
/// assert_eq!(
///     error.format_stack(),
///     "TypeError: undefined is not a function\n    at main (app.js:4:2)"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Stack trace (call stack at the time the error was created)
    pub stack: Vec<StackFrame>,
    /// Source position where the error occurred
    pub source_position: Option<SourcePosition>,
}

impl JsError {
    /// Creates an error of the given kind with an empty stack.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: Vec::new(),
            source_position: None,
        }
    }

    /// Creates a plain `Error`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Error, message)
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates a `RangeError`.
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    /// Creates a `ReferenceError`.
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceError, message)
    }

    /// Replaces the stack trace.
    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }

    /// Formats the error the way `error.stack` reads in JavaScript: the
    /// `Name: message` headline followed by one line per frame.
    pub fn format_stack(&self) -> String {
        let mut result = if self.message.is_empty() {
            self.kind.name().to_string()
        } else {
            self.to_string()
        };
        for frame in &self.stack {
            result.push('\n');
            result.push_str(&frame.to_string());
        }
        result
    }
}
