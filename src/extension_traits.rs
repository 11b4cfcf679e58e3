//! Provides useful [extension traits][]. Okay, currently just [GrowGeometrically].
//!
//! [extension traits]: https://rust-lang.github.io/rfcs/0445-extension-trait-conventions.html

/// The capacity of a buffer the first time it grows.
pub const MIN_CAPACITY: usize = 8;

/// Returns the capacity a buffer should grow to: at least [MIN_CAPACITY], doubling afterwards.
///
/// ```
/// use hydro::extension_traits::grow_capacity;
///
/// assert_eq!(8, grow_capacity(0));
/// assert_eq!(8, grow_capacity(4));
/// assert_eq!(16, grow_capacity(8));
/// assert_eq!(32, grow_capacity(16));
/// ```
#[inline]
pub fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY {
        MIN_CAPACITY
    } else {
        capacity * 2
    }
}

/// Extends [Vec] with [GrowGeometrically::push_growing()], which grows the way the bytecode
/// buffers are supposed to: 8 slots first, then double.
///
/// ```
/// use hydro::extension_traits::GrowGeometrically;
///
/// let mut v: Vec<u8> = Vec::new();
/// v.push_growing(1);
/// assert!(v.capacity() >= 8);
///
/// for byte in 2..=9 {
///     v.push_growing(byte);
/// }
/// assert_eq!(9, v.len());
/// assert!(v.capacity() >= 16);
/// ```
pub trait GrowGeometrically<T> {
    /// Appends an item, growing the buffer to [grow_capacity()] first if it is full.
    fn push_growing(&mut self, item: T);
}

impl<T> GrowGeometrically<T> for Vec<T> {
    fn push_growing(&mut self, item: T) {
        if self.len() == self.capacity() {
            let target = grow_capacity(self.capacity());
            self.reserve_exact(target - self.len());
        }
        self.push(item)
    }
}
