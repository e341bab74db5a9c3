//! Objects with fallible property access.
//!
//! Reading a property can run user code (a getter) and therefore throw.
//! [`JsObject::get`] surfaces that as an explicit `Result` instead of an
//! unwinding exception, which is what the promise resolution procedure
//! needs when it checks a value for a `then` method.

use crate::{Completion, Function, Value};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Property key under which an object exposes its iterator factory
/// (the stand-in for `Symbol.iterator`).
pub const ITERATOR_KEY: &str = "@@iterator";

/// A heap object as seen by the engine.
pub trait JsObject: Any {
    /// Reads a property. Missing properties read as `undefined`; a throwing
    /// getter yields `Err` with the thrown value.
    fn get(&self, key: &str) -> Completion;

    /// Class name used for display, e.g. `"Promise"`.
    fn class_name(&self) -> &'static str {
        "Object"
    }

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting a shared handle.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// A property slot of a [`PlainObject`].
#[derive(Debug, Clone)]
pub enum Property {
    /// Plain data property
    Data(Value),
    /// Accessor property; the getter runs with `undefined` as `this`
    Getter(Function),
}

/// An ordinary object: a bag of data and getter properties.
///
/// # Examples
///
/// ```
/// use core_types::{Function, JsError, JsObject, PlainObject, Value};
///
/// let obj = PlainObject::new().with("answer", Value::Smi(42));
/// obj.define_getter(
///     "broken",
///     Function::new(|_this, _args| Err(JsError::error("boom").into())),
/// );
///
/// assert_eq!(obj.get("answer"), Ok(Value::Smi(42)));
/// assert_eq!(obj.get("missing"), Ok(Value::Undefined));
/// assert!(obj.get("broken").is_err());
/// ```
#[derive(Debug, Default)]
pub struct PlainObject {
    properties: RefCell<HashMap<String, Property>>,
}

impl PlainObject {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`PlainObject::set`].
    pub fn with(self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    /// Defines or overwrites a data property.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.properties
            .borrow_mut()
            .insert(key.into(), Property::Data(value));
    }

    /// Defines or overwrites an accessor property.
    pub fn define_getter(&self, key: impl Into<String>, getter: Function) {
        self.properties
            .borrow_mut()
            .insert(key.into(), Property::Getter(getter));
    }

    /// Wraps the object into a [`Value`].
    pub fn into_value(self) -> Value {
        Value::Object(Rc::new(self))
    }
}

impl JsObject for PlainObject {
    fn get(&self, key: &str) -> Completion {
        // Clone the slot out so a getter may touch this object again.
        let slot = self.properties.borrow().get(key).cloned();
        match slot {
            Some(Property::Data(value)) => Ok(value),
            Some(Property::Getter(getter)) => getter.invoke(&[]),
            None => Ok(Value::Undefined),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
