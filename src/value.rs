//! Representation of values in hydro.

use std::rc::Rc;

use crate::extension_traits::GrowGeometrically;
use crate::object::{Obj, ObjString};

extern crate static_assertions as sa;

/// A hydro runtime value.
///
/// Numbers ([f64]), booleans, nil, and heap objects are supported. Inspecting a boolean, nil or
/// number never touches the heap; cloning an object value only bumps a reference count.
///
/// You can create a hydro value from its equivalent Rust type:
///
/// ```
/// # use hydro::value::Value;
/// let float: f64 = 0.5;
/// let v: Value = float.into();
/// assert_eq!("0.5", v.to_string());
///
/// let switch = false;
/// let v: Value = switch.into();
/// assert_eq!("false", v.to_string());
/// ```
///
/// This even works with `Option<T>`: `None` turns [Value::Nil].
///
/// ```
/// # use hydro::value::Value;
/// let option = Some(0.25);
/// let v: Value = option.into();
/// assert_eq!("0.25", v.to_string());
///
/// let option: Option<f64> = None;
/// let v: Value = option.into();
/// assert_eq!("nil", v.to_string());
/// ```
///
/// # Strings
///
/// String data is owned by the [Gc](crate::gc::Gc) and must be interned, so strings are created
/// through [copy_string](crate::object::copy_string) rather than converted directly:
///
/// ```
/// # use hydro::gc::Gc;
/// # use hydro::object::copy_string;
/// # use hydro::table::Table;
/// # use hydro::value::Value;
/// let mut gc = Gc::default();
/// let mut strings = Table::default();
/// let v: Value = copy_string(&mut gc, &mut strings, "Hello").into();
/// assert_eq!(true, v.is_string());
/// assert_eq!(false, v.is_falsy());
/// ```
#[derive(Debug, Default, Clone)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// Nil. Doing anything with this is usually an error.
    #[default]
    Nil,
    /// All numbers in hydro are 64-bit floating point.
    Number(f64),
    /// A reference to a heap object registered with the [Gc](crate::gc::Gc).
    Object(Obj),
}

sa::const_assert!(std::mem::size_of::<Value>() <= 16);

/// A collection of values. Used as a chunk's constant pool.
#[derive(Default, Debug, Clone)]
pub struct ValueArray {
    values: Vec<Value>,
}

///////////////////////////////////////// Implementation //////////////////////////////////////////

impl Value {
    /// Returns true if this value is hydro's nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns true if this value is a heap object.
    pub fn is_obj(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Returns true if this value is a hydro number.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Returns true if this value is a hydro string.
    pub fn is_string(&self) -> bool {
        self.as_string().is_some()
    }

    /// Returns true if this value is "falsy". Only nil and false are; zero is truthy.
    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Returns the number, if this value is a hydro number.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(num) => Some(*num),
            _ => None,
        }
    }

    /// Returns the string object, if this value is a hydro string.
    #[inline]
    pub fn as_string(&self) -> Option<&Rc<ObjString>> {
        match self {
            Value::Object(Obj::String(string)) => Some(string),
            _ => None,
        }
    }

    /// Applies hydro's rules for equality, returning a Rust bool.
    ///
    /// Values of different types are never equal. Strings compare by content even though
    /// interning makes equal strings share one object.
    #[inline]
    pub fn equal(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Number(a), Number(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Nil, Nil) => true,
            (Object(Obj::String(a)), Object(Obj::String(b))) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Number(num) => write!(f, "{num}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Object(obj) => write!(f, "{obj}"),
        }
    }
}

impl std::cmp::PartialEq for Value {
    fn eq(&self, rhs: &Value) -> bool {
        self.equal(rhs)
    }
}

// Convert any Rust float into a hydro value.
impl From<f64> for Value {
    #[inline(always)]
    fn from(float: f64) -> Value {
        Value::Number(float)
    }
}

// Convert any Rust bool into a hydro value.
impl From<bool> for Value {
    #[inline(always)]
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}

// Wrap an interned string.
impl From<Rc<ObjString>> for Value {
    #[inline]
    fn from(string: Rc<ObjString>) -> Value {
        Value::Object(Obj::String(string))
    }
}

// Convert any Rust option to a hydro value.
impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    #[inline]
    fn from(option: Option<T>) -> Value {
        option.map(Into::into).unwrap_or(Value::Nil)
    }
}

impl ValueArray {
    /// Return an empty [ValueArray].
    pub fn new() -> Self {
        ValueArray::default()
    }

    /// Returns a [Value] at the given index. If the index is out of bounds, this returns `None`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Add a new [Value] to the array, returning its index.
    pub fn write(&mut self, value: Value) -> usize {
        self.values.push_growing(value);
        self.values.len() - 1
    }

    /// Returns how many values are in the pool.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the values in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}
