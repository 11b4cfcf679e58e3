//! A garbage collector (GC) that never collects.
//!
//! Normally "GC" stands for "garbage collector", but in this codebase, "GC" just stands for
//! "garbage" 🙃 It is the registry of every heap object allocated while compiling and running
//! code. Nothing is reclaimed until the GC itself is dropped.

use log::debug;

use crate::object::Obj;

/// The registry of all heap objects, in allocation order.
///
/// Values hold shared references to objects, but the GC is the place that knows about all of
/// them. Dropping the GC releases its hold on every object at once.
///
/// ```
/// # use hydro::gc::Gc;
/// # use hydro::object::copy_string;
/// # use hydro::table::Table;
/// let mut gc = Gc::default();
/// let mut strings = Table::default();
/// assert_eq!(0, gc.n_objects());
///
/// copy_string(&mut gc, &mut strings, "hello");
/// assert_eq!(1, gc.n_objects());
///
/// gc.free_objects();
/// assert_eq!(0, gc.n_objects());
/// ```
#[derive(Debug, Default)]
pub struct Gc {
    objects: Vec<Obj>,
}

impl Gc {
    /// Registers a newly allocated object.
    pub fn track(&mut self, object: Obj) {
        self.objects.push(object);
    }

    /// Return how many objects are currently registered.
    pub fn n_objects(&self) -> usize {
        self.objects.len()
    }

    /// Iterates over every registered object, oldest first.
    pub fn objects(&self) -> impl Iterator<Item = &Obj> {
        self.objects.iter()
    }

    /// Releases every registered object.
    pub fn free_objects(&mut self) {
        if !self.objects.is_empty() {
            debug!("freeing {} object(s)", self.objects.len());
        }
        self.objects.clear();
    }
}

impl Drop for Gc {
    fn drop(&mut self) {
        self.free_objects();
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::*;
    use crate::object::{copy_string, take_string, ObjType};
    use crate::table::Table;

    #[test]
    fn test_gc() {
        let mut gc = Gc::default();
        let mut strings = Table::default();

        copy_string(&mut gc, &mut strings, "hello");
        take_string(&mut gc, &mut strings, "world".to_owned());
        assert_eq!(2, gc.n_objects());
        assert!(gc.objects().all(|o| o.obj_type() == ObjType::String));
    }

    #[test]
    fn free_objects_releases_references() {
        let mut gc = Gc::default();
        let mut strings = Table::default();

        let s = copy_string(&mut gc, &mut strings, "🍕");
        // One for us, one for the GC, one for the intern pool.
        assert_eq!(3, Rc::strong_count(&s));

        gc.free_objects();
        assert_eq!(0, gc.n_objects());
        assert_eq!(2, Rc::strong_count(&s));
    }
}
