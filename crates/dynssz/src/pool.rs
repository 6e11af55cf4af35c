//! Pooled offset vectors.
//!
//! Decoding a container on a non-seekable cursor collects its dynamic
//! offsets into a small vector. Containers nest, so these are borrowed from
//! a free-list instead of allocated per container, and a scope guard returns
//! them on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// A free-list of reusable `u32` offset buffers.
#[derive(Debug, Default)]
pub(crate) struct OffsetPool {
    free: Mutex<Vec<Vec<u32>>>,
}

impl OffsetPool {
    pub(crate) const fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Borrow an empty offset buffer.
    pub(crate) fn get(&self) -> OffsetGuard<'_> {
        let vec = self
            .free
            .lock()
            .expect("offset pool lock poisoned")
            .pop()
            .unwrap_or_default();
        OffsetGuard {
            pool: self,
            vec: Some(vec),
        }
    }

    fn put(&self, mut vec: Vec<u32>) {
        vec.clear();
        self.free
            .lock()
            .expect("offset pool lock poisoned")
            .push(vec);
    }
}

/// Scope guard over a borrowed offset buffer.
#[derive(Debug)]
pub(crate) struct OffsetGuard<'a> {
    pool: &'a OffsetPool,
    vec: Option<Vec<u32>>,
}

impl Deref for OffsetGuard<'_> {
    type Target = Vec<u32>;

    fn deref(&self) -> &Vec<u32> {
        self.vec.as_ref().expect("buffer present until drop")
    }
}

impl DerefMut for OffsetGuard<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u32> {
        self.vec.as_mut().expect("buffer present until drop")
    }
}

impl Drop for OffsetGuard<'_> {
    fn drop(&mut self) {
        if let Some(vec) = self.vec.take() {
            self.pool.put(vec);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_returns_cleared_buffer() {
        let pool = OffsetPool::new();
        {
            let mut offsets = pool.get();
            offsets.push(4);
            offsets.push(8);
        }
        let offsets = pool.get();
        assert!(offsets.is_empty());
        assert_eq!(pool.free.lock().unwrap().len(), 0);
    }

    #[test]
    fn nested_borrows() {
        let pool = OffsetPool::new();
        let mut outer = pool.get();
        outer.push(1);
        let mut inner = pool.get();
        inner.push(2);
        drop(inner);
        assert_eq!(outer.as_slice(), &[1]);
    }
}
