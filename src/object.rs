//! Heap objects. Currently, the only kind of object is the interned [ObjString].

use std::fmt;
use std::rc::Rc;

use crate::gc::Gc;
use crate::table::Table;

/// A reference to a heap object. The variant is the object's type tag.
#[derive(Debug, Clone)]
pub enum Obj {
    /// An interned string.
    String(Rc<ObjString>),
}

/// An immutable, interned string with its hash precomputed.
#[derive(Debug)]
pub struct ObjString {
    hash: u32,
    chars: Box<str>,
}

/// The type of a heap object, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjType {
    String,
}

impl Obj {
    /// Returns the type tag of this object.
    pub fn obj_type(&self) -> ObjType {
        match self {
            Obj::String(_) => ObjType::String,
        }
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Obj::String(string) => write!(f, "{}", string.as_str()),
        }
    }
}

impl ObjString {
    /// The precomputed FNV-1a hash of the contents.
    #[inline(always)]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Returns true for the empty string.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The string contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.chars
    }
}

/// FNV-1a (32-bit) over the raw bytes.
///
/// ```
/// use hydro::object::hash_string;
/// assert_eq!(2166136261, hash_string(""));
/// assert_eq!(0xe40c292c, hash_string("a"));
/// ```
pub fn hash_string(key: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in key.as_bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Returns the interned string with the given contents, copying the contents into a new object if
/// no such string has been interned yet.
pub fn copy_string(gc: &mut Gc, strings: &mut Table, chars: &str) -> Rc<ObjString> {
    let hash = hash_string(chars);
    if let Some(interned) = strings.find_string(chars, hash) {
        return interned;
    }

    allocate_string(gc, strings, chars.into(), hash)
}

/// Like [copy_string()], but takes ownership of a freshly built buffer (for example, the result of
/// a concatenation). If an equal string is already interned, the buffer is dropped.
pub fn take_string(gc: &mut Gc, strings: &mut Table, chars: String) -> Rc<ObjString> {
    let hash = hash_string(&chars);
    if let Some(interned) = strings.find_string(&chars, hash) {
        return interned;
    }

    allocate_string(gc, strings, chars.into_boxed_str(), hash)
}

/// Creates the object, registers it with the GC, and adds it to the intern pool.
fn allocate_string(gc: &mut Gc, strings: &mut Table, chars: Box<str>, hash: u32) -> Rc<ObjString> {
    let string = Rc::new(ObjString { hash, chars });
    gc.track(Obj::String(Rc::clone(&string)));
    // The intern pool is a set: only the key matters.
    strings.set(Rc::clone(&string), crate::value::Value::Nil);
    string
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_returns_the_same_object() {
        let mut gc = Gc::default();
        let mut strings = Table::default();

        let first = copy_string(&mut gc, &mut strings, "foo");
        let second = copy_string(&mut gc, &mut strings, "foo");
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(1, gc.n_objects());

        let other = copy_string(&mut gc, &mut strings, "bar");
        assert!(!Rc::ptr_eq(&first, &other));
        assert_eq!(2, gc.n_objects());
    }

    #[test]
    fn take_string_reuses_interned_copy() {
        let mut gc = Gc::default();
        let mut strings = Table::default();

        let copied = copy_string(&mut gc, &mut strings, "Hello, World!");
        let taken = take_string(&mut gc, &mut strings, format!("Hello, {}!", "World"));
        assert!(Rc::ptr_eq(&copied, &taken));
        assert_eq!(1, gc.n_objects());
    }

    #[test]
    fn take_string_allocates_new_strings() {
        let mut gc = Gc::default();
        let mut strings = Table::default();

        let taken = take_string(&mut gc, &mut strings, "🦀".to_owned());
        assert_eq!("🦀", taken.as_str());
        assert_eq!(4, taken.len());
        assert_eq!(hash_string("🦀"), taken.hash());
        assert_eq!(1, gc.n_objects());
        assert_eq!(ObjType::String, Obj::String(taken).obj_type());
    }
}
