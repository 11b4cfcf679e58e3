//! An open-addressing hash table keyed by interned strings.
//!
//! The same [Table] serves as the intern pool (a set: only keys matter) and as the environment
//! of global variables. Because every key is interned, keys are matched by identity.

use std::rc::Rc;

use crate::extension_traits::grow_capacity;
use crate::object::ObjString;
use crate::value::Value;

/// The table grows before `count` would exceed this fraction of the capacity.
pub const TABLE_MAX_LOAD: f64 = 0.75;

/// A hash table from interned strings to [Value]s, using linear probing and tombstones.
///
/// ```
/// # use hydro::gc::Gc;
/// # use hydro::object::copy_string;
/// # use hydro::table::Table;
/// # use hydro::value::Value;
/// let mut gc = Gc::default();
/// let mut strings = Table::default();
/// let foo = copy_string(&mut gc, &mut strings, "foo");
///
/// let mut globals = Table::default();
/// assert!(globals.set(foo.clone(), 6.9.into()));
/// assert_eq!(Some(Value::Number(6.9)), globals.get(&foo));
///
/// assert!(globals.delete(&foo));
/// assert_eq!(None, globals.get(&foo));
/// ```
#[derive(Debug, Default, Clone)]
pub struct Table {
    /// Live entries plus tombstones.
    count: usize,
    entries: Vec<Entry>,
}

/// One slot in the [Table].
///
/// - empty: no key, value is nil
/// - tombstone: no key, value is `true`
/// - live: has a key
#[derive(Debug, Default, Clone)]
struct Entry {
    key: Option<Rc<ObjString>>,
    value: Value,
}

impl Entry {
    /// True for a slot that was never used. Probing stops here.
    #[inline]
    fn is_empty(&self) -> bool {
        self.key.is_none() && self.value.is_nil()
    }

    /// Turns this slot into a tombstone.
    #[inline]
    fn bury(&mut self) {
        self.key = None;
        self.value = Value::Bool(true);
    }
}

impl Table {
    /// Return an empty table. Nothing is allocated until the first insertion.
    pub fn new() -> Self {
        Table::default()
    }

    /// Returns the value associated with the key, if any.
    pub fn get(&self, key: &ObjString) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }

        let entry = &self.entries[find_entry(&self.entries, key)];
        entry.key.as_ref().map(|_| entry.value.clone())
    }

    /// Associates the value with the key. Returns `true` if the key was not present before.
    pub fn set(&mut self, key: Rc<ObjString>, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * TABLE_MAX_LOAD {
            self.adjust_capacity(grow_capacity(self.capacity()));
        }

        let index = find_entry(&self.entries, &key);
        let entry = &mut self.entries[index];
        let is_new_key = entry.key.is_none();
        // Reusing a tombstone does not change the count; it was already counted.
        if entry.is_empty() {
            self.count += 1;
        }

        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    /// Removes the key, leaving a tombstone in its place. Returns `false` if it was absent.
    pub fn delete(&mut self, key: &ObjString) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        let index = find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_none() {
            return false;
        }

        entry.bury();
        true
    }

    /// Copies every live entry of this table into `dest`.
    pub fn add_all(&self, dest: &mut Table) {
        for (key, value) in self.iter() {
            dest.set(Rc::clone(key), value.clone());
        }
    }

    /// Looks up an interned string by its contents. This is how the intern pool finds out whether
    /// a string already exists before any object has been made for it.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<Rc<ObjString>> {
        if self.entries.is_empty() {
            return None;
        }

        let capacity = self.entries.len();
        let mut index = hash as usize % capacity;
        loop {
            let entry = &self.entries[index];
            match &entry.key {
                // Skip over tombstones, but stop at an empty slot.
                None if entry.is_empty() => return None,
                None => {}
                Some(key) => {
                    if key.len() == chars.len() && key.hash() == hash && key.as_str() == chars {
                        return Some(Rc::clone(key));
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    /// Iterates over every live (key, value) pair, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&Rc<ObjString>, &Value)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.key.as_ref().map(|key| (key, &entry.value)))
    }

    /// Returns how many live entries there are.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Returns the number of live entries plus tombstones; this is what the load factor limits.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Rebuilds the table with the given number of slots. Tombstones are dropped.
    fn adjust_capacity(&mut self, capacity: usize) {
        let mut entries = vec![Entry::default(); capacity];

        self.count = 0;
        for entry in self.entries.drain(..) {
            if let Some(key) = entry.key {
                let index = find_entry(&entries, &key);
                entries[index] = Entry {
                    key: Some(key),
                    value: entry.value,
                };
                self.count += 1;
            }
        }

        self.entries = entries;
    }
}

/// Returns the index of the slot for the key: either the slot holding it, or where it should be
/// inserted (the first tombstone seen, else the empty slot that ended the probe).
///
/// `entries` must not be empty and must contain at least one empty slot.
fn find_entry(entries: &[Entry], key: &ObjString) -> usize {
    let capacity = entries.len();
    let mut index = key.hash() as usize % capacity;
    let mut tombstone = None;

    loop {
        let entry = &entries[index];
        match &entry.key {
            None if entry.is_empty() => return tombstone.unwrap_or(index),
            None => {
                tombstone.get_or_insert(index);
            }
            Some(existing) if std::ptr::eq(Rc::as_ptr(existing), key) => return index,
            Some(_) => {}
        }
        index = (index + 1) % capacity;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gc::Gc;
    use crate::object::copy_string;

    fn keys(names: &[&str]) -> (Gc, Table, Vec<Rc<ObjString>>) {
        let mut gc = Gc::default();
        let mut strings = Table::default();
        let keys = names
            .iter()
            .map(|name| copy_string(&mut gc, &mut strings, name))
            .collect();
        (gc, strings, keys)
    }

    #[test]
    fn crud_operations() {
        let (_gc, _strings, keys) = keys(&["foo"]);
        let foo = &keys[0];

        let mut table = Table::new();
        assert_eq!(0, table.capacity());
        assert_eq!(0, table.count());

        // Retrieving and deleting a non-existent key.
        assert_eq!(None, table.get(foo));
        assert!(!table.delete(foo));

        assert!(table.set(foo.clone(), 6.9.into()));
        assert_eq!(Some(Value::Number(6.9)), table.get(foo));

        // Updating is not a new key.
        assert!(!table.set(foo.clone(), 4.2.into()));
        assert_eq!(Some(Value::Number(4.2)), table.get(foo));

        assert!(table.delete(foo));
        assert_eq!(None, table.get(foo));
        assert!(!table.delete(foo));
    }

    #[test]
    fn reinsert_after_delete() {
        let names: Vec<String> = (0..20).map(|i| format!("key{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_gc, _strings, keys) = keys(&names);

        let mut table = Table::new();
        for (i, key) in keys.iter().enumerate() {
            table.set(key.clone(), (i as f64).into());
        }

        assert!(table.delete(&keys[3]));
        let count_with_tombstone = table.count();

        // Re-inserting reuses the tombstone, so the count does not change.
        assert!(table.set(keys[3].clone(), 33.0.into()));
        assert_eq!(count_with_tombstone, table.count());
        assert_eq!(Some(Value::Number(33.0)), table.get(&keys[3]));

        // Every other key is still reachable.
        for (i, key) in keys.iter().enumerate().filter(|(i, _)| *i != 3) {
            assert_eq!(Some(Value::Number(i as f64)), table.get(key));
        }
        assert_eq!(20, table.len());
    }

    #[test]
    fn load_factor_is_respected() {
        let names: Vec<String> = (0..100).map(|i| format!("v{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_gc, _strings, keys) = keys(&names);

        let mut table = Table::new();
        for (i, key) in keys.iter().enumerate() {
            table.set(key.clone(), Value::Nil);
            assert!(table.count() as f64 <= table.capacity() as f64 * TABLE_MAX_LOAD);
            if i % 3 == 0 {
                table.delete(key);
            }
        }

        // Deleted keys stay deleted across rehashes.
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(i % 3 != 0, table.get(key).is_some(), "key {i}");
        }
    }

    #[test]
    fn find_string_skips_tombstones() {
        let (_gc, strings, keys) = keys(&["a", "b", "c"]);
        let mut table = Table::new();
        for key in &keys {
            table.set(key.clone(), Value::Nil);
        }
        table.delete(&keys[0]);

        assert!(table.find_string("a", keys[0].hash()).is_none());
        let found = table.find_string("c", keys[2].hash()).expect("c is in the table");
        assert!(Rc::ptr_eq(&keys[2], &found));

        // The intern pool itself finds all three.
        assert_eq!(3, strings.len());
        assert!(strings.find_string("b", keys[1].hash()).is_some());
        assert!(strings.find_string("d", crate::object::hash_string("d")).is_none());
    }

    #[test]
    fn add_all_copies_live_entries() {
        let (_gc, _strings, keys) = keys(&["x", "y"]);
        let mut source = Table::new();
        source.set(keys[0].clone(), 1.0.into());
        source.set(keys[1].clone(), 2.0.into());
        source.delete(&keys[1]);

        let mut dest = Table::new();
        source.add_all(&mut dest);
        assert_eq!(1, dest.len());
        assert_eq!(Some(Value::Number(1.0)), dest.get(&keys[0]));
        assert_eq!(None, dest.get(&keys[1]));
    }
}
