//! Callable values.
//!
//! A [`Function`] is shared (cloning it clones a handle, not the closure) and
//! is called with a `this` receiver and an argument list. Throwing is
//! modelled by returning `Err` with the thrown value.

use crate::Value;
use std::fmt;
use std::rc::Rc;

/// The result of running JavaScript-level code: `Ok` with the returned
/// value, or `Err` with the thrown value.
pub type Completion = Result<Value, Value>;

/// A JavaScript function.
///
/// # Examples
///
/// ```
/// use core_types::{Function, Value};
///
/// let add = Function::new(|_this, args| match (args.first(), args.get(1)) {
///     (Some(Value::Smi(a)), Some(Value::Smi(b))) => Ok(Value::Smi(a + b)),
///     _ => Ok(Value::Undefined),
/// });
/// assert_eq!(add.invoke(&[Value::Smi(1), Value::Smi(2)]), Ok(Value::Smi(3)));
/// ```
#[derive(Clone)]
pub struct Function {
    callback: Rc<dyn Fn(&Value, &[Value]) -> Completion>,
}

impl Function {
    /// Creates a function from a closure receiving `this` and the arguments.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Completion + 'static,
    {
        Self {
            callback: Rc::new(f),
        }
    }

    /// Creates a function that only looks at its first argument
    /// (`undefined` when called without arguments).
    pub fn unary<F>(f: F) -> Self
    where
        F: Fn(Value) -> Completion + 'static,
    {
        Self::new(move |_this, args| f(args.first().cloned().unwrap_or(Value::Undefined)))
    }

    /// Calls the function with an explicit receiver.
    pub fn call(&self, this: &Value, args: &[Value]) -> Completion {
        (self.callback)(this, args)
    }

    /// Calls the function with `undefined` as the receiver.
    pub fn invoke(&self, args: &[Value]) -> Completion {
        self.call(&Value::Undefined, args)
    }

    /// Returns a new function whose receiver is fixed to `this`
    /// (`Function.prototype.bind` without partial arguments).
    pub fn bind(&self, this: Value) -> Function {
        let target = self.clone();
        Function::new(move |_ignored, args| target.call(&this, args))
    }

    /// Identity comparison: true when both handles refer to the same closure.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(&other.callback))
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function {{ ... }}")
    }
}
