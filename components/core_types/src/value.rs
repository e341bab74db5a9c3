//! JavaScript value representation.
//!
//! This module provides the core `Value` enum. Primitives are stored inline;
//! arrays, errors, functions and objects are shared handles, and equality on
//! them is identity, which makes `==` on [`Value`] behave like `===`.

use crate::{Completion, Function, JsError, JsObject};
use num_bigint::BigInt;
use num_traits::Zero;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Represents any JavaScript value.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::Smi(42);
/// let list = Value::array(vec![Value::Smi(1), Value::Smi(2)]);
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(list.type_of(), "object");
/// assert_eq!(list, list.clone());
/// assert_ne!(list, Value::array(vec![Value::Smi(1), Value::Smi(2)]));
/// ```
#[derive(Clone)]
pub enum Value {
    /// JavaScript undefined value
    Undefined,
    /// JavaScript null value
    Null,
    /// JavaScript boolean (true or false)
    Boolean(bool),
    /// Small integer
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// JavaScript string value
    String(std::string::String),
    /// JavaScript BigInt (arbitrary precision integer)
    BigInt(BigInt),
    /// Array object
    Array(Rc<RefCell<Vec<Value>>>),
    /// Error instance
    Error(Rc<JsError>),
    /// Callable object
    Function(Function),
    /// Any other object, promises included
    Object(Rc<dyn JsObject>),
}

impl Value {
    /// Wraps a vector into a fresh array object.
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Wraps an object implementation into a value.
    pub fn object(object: impl JsObject) -> Value {
        Value::Object(Rc::new(object))
    }

    /// Returns whether this value is truthy in JavaScript semantics.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(!Value::Undefined.is_truthy());
    /// assert!(!Value::Smi(0).is_truthy());
    /// assert!(!Value::Double(f64::NAN).is_truthy());
    /// assert!(!Value::String(String::new()).is_truthy());
    /// assert!(Value::array(vec![]).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Smi(n) => *n != 0,
            Value::Double(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::BigInt(n) => !n.is_zero(),
            Value::Array(_) | Value::Error(_) | Value::Function(_) | Value::Object(_) => true,
        }
    }

    /// Returns the JavaScript `typeof` result for this value.
    pub fn type_of(&self) -> String {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // JavaScript quirk
            Value::Boolean(_) => "boolean",
            Value::Smi(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::BigInt(_) => "bigint",
            Value::Function(_) => "function",
            Value::Array(_) | Value::Error(_) | Value::Object(_) => "object",
        }
        .to_string()
    }

    /// True for values that may carry properties (the values the promise
    /// resolution procedure looks up `then`).
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Error(_) | Value::Function(_) | Value::Object(_)
        )
    }

    /// Returns the function if this value is callable.
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the error if this value is an `Error` instance.
    pub fn as_error(&self) -> Option<&JsError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the numeric value of number primitives.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Smi(n) => Some(f64::from(*n)),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Reads a property. Only [`Value::Object`] carries user-visible
    /// properties; every other value reads as `undefined`.
    pub fn get(&self, key: &str) -> Completion {
        match self {
            Value::Object(object) => object.get(key),
            _ => Ok(Value::Undefined),
        }
    }
}

thread_local! {
    static FORMATTING: RefCell<Vec<*const RefCell<Vec<Value>>>> = const { RefCell::new(Vec::new()) };
}

/// Marks an array as being formatted on this thread until dropped.
struct FormatGuard(*const RefCell<Vec<Value>>);

impl FormatGuard {
    /// `None` when the array is already being formatted further up.
    fn enter(items: &Rc<RefCell<Vec<Value>>>) -> Option<FormatGuard> {
        let ptr = Rc::as_ptr(items);
        FORMATTING.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&ptr) {
                return None;
            }
            active.push(ptr);
            Some(FormatGuard(ptr))
        })
    }
}

impl Drop for FormatGuard {
    fn drop(&mut self) {
        FORMATTING.with(|active| active.borrow_mut().retain(|ptr| *ptr != self.0));
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Smi(n) => f.debug_tuple("Smi").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::BigInt(n) => f.debug_tuple("BigInt").field(n).finish(),
            Value::Array(items) => match FormatGuard::enter(items) {
                Some(_guard) => f.debug_tuple("Array").field(&*items.borrow()).finish(),
                None => write!(f, "Array([...])"),
            },
            Value::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Value::Function(_) => write!(f, "Function(...)"),
            Value::Object(o) => write!(f, "Object({})", o.class_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Smi(a), Value::Smi(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Smi(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<JsError> for Value {
    fn from(error: JsError) -> Self {
        Value::Error(Rc::new(error))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

/// JavaScript `String()` conversion.
///
/// # Examples
///
/// ```
/// use core_types::{JsError, Value};
///
/// assert_eq!(Value::Undefined.to_string(), "undefined");
/// assert_eq!(Value::Double(2.0).to_string(), "2");
/// assert_eq!(Value::array(vec![Value::Smi(1), Value::Null]).to_string(), "1,");
/// assert_eq!(Value::from(JsError::type_error("bad")).to_string(), "TypeError: bad");
/// ```
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    // Integer-valued doubles display without decimal point
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::Array(items) => {
                // Array.prototype.join semantics: null, undefined and an
                // array already being joined print empty
                let Some(_guard) = FormatGuard::enter(items) else {
                    return Ok(());
                };
                let items = items.borrow();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !matches!(item, Value::Undefined | Value::Null) {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Error(e) => write!(f, "{}", e),
            Value::Function(_) => write!(f, "function () {{ [native code] }}"),
            Value::Object(_) => write!(f, "[object Object]"),
        }
    }
}
