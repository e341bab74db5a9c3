//! Source position and stack frame types for JavaScript error tracking.
//!
//! This module provides types for tracking source locations and call stacks.
//! Promise creation traces are recorded as a list of [`StackFrame`]s.

use std::fmt;
use std::panic::Location;

/// Represents a position in source code.
///
/// # Examples
///
/// ```
/// use core_types::SourcePosition;
///
/// let pos = SourcePosition {
///     line: 10,
///     column: 5,
///     offset: 150,
/// };
///
/// assert_eq!(pos.line, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Byte offset from the start of the source file
    pub offset: usize,
}

/// Represents a single frame in a call stack.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame {
///     function_name: Some("loadUser".to_string()),
///     source_url: Some("file:///main.js".to_string()),
///     line: 25,
///     column: 10,
/// };
///
/// assert_eq!(frame.to_string(), "    at loadUser (file:///main.js:25:10)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the function, or None for anonymous functions
    pub function_name: Option<String>,
    /// URL or file path of the source, or None if not available
    pub source_url: Option<String>,
    /// Line number where the call occurred
    pub line: u32,
    /// Column number where the call occurred
    pub column: u32,
}

impl StackFrame {
    /// Builds a frame pointing at a Rust call site.
    ///
    /// Used when the host has no script stack to offer; paired with
    /// `#[track_caller]` this records the code that created a promise.
    pub fn from_location(location: &Location<'_>) -> Self {
        Self {
            function_name: None,
            source_url: Some(location.file().to_string()),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl From<&StackFrame> for SourcePosition {
    /// The frame's line and column. Frames carry no byte offset, so it is 0.
    fn from(frame: &StackFrame) -> Self {
        Self {
            line: frame.line,
            column: frame.column,
            offset: 0,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self.source_url.as_deref().unwrap_or("<anonymous>");
        match &self.function_name {
            Some(name) => write!(f, "    at {} ({}:{}:{})", name, source, self.line, self.column),
            None => write!(f, "    at {}:{}:{}", source, self.line, self.column),
        }
    }
}
