// Modified in 2025 from the original version
// Original source licensed under the Apache License 2.0

//! Pooled hasher instances.
//!
//! Hash-tree-root walks allocate a scratch buffer that is worth reusing. The
//! pool is a mutex-guarded free-list; [`HasherPool::get`] hands out a guard
//! that resets and returns the hasher when dropped, on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::{LazyLock, Mutex};

use crate::{Hasher, Sha256Backend, StandardBackend, VectorizedBackend};

/// A free-list of [`Hasher`] scratch instances over one backend.
pub struct HasherPool {
    backend: &'static dyn Sha256Backend,
    free: Mutex<Vec<Hasher>>,
}

impl std::fmt::Debug for HasherPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HasherPool").finish_non_exhaustive()
    }
}

impl HasherPool {
    /// An empty pool over `backend`.
    pub const fn new(backend: &'static dyn Sha256Backend) -> Self {
        Self {
            backend,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a reset hasher, creating one if the free-list is empty.
    pub fn get(&self) -> PooledHasher<'_> {
        let hasher = self
            .free
            .lock()
            .expect("hasher pool lock poisoned")
            .pop()
            .unwrap_or_else(|| Hasher::new(self.backend));
        PooledHasher {
            pool: self,
            hasher: Some(hasher),
        }
    }

    fn put(&self, mut hasher: Hasher) {
        hasher.reset();
        self.free
            .lock()
            .expect("hasher pool lock poisoned")
            .push(hasher);
    }
}

/// Scope guard over a borrowed [`Hasher`].
#[derive(Debug)]
pub struct PooledHasher<'a> {
    pool: &'a HasherPool,
    hasher: Option<Hasher>,
}

impl Deref for PooledHasher<'_> {
    type Target = Hasher;

    fn deref(&self) -> &Hasher {
        self.hasher.as_ref().expect("hasher present until drop")
    }
}

impl DerefMut for PooledHasher<'_> {
    fn deref_mut(&mut self) -> &mut Hasher {
        self.hasher.as_mut().expect("hasher present until drop")
    }
}

impl Drop for PooledHasher<'_> {
    fn drop(&mut self) {
        if let Some(hasher) = self.hasher.take() {
            self.pool.put(hasher);
        }
    }
}

static STANDARD_POOL: LazyLock<HasherPool> = LazyLock::new(|| HasherPool::new(&StandardBackend));
static VECTORIZED_POOL: LazyLock<HasherPool> =
    LazyLock::new(|| HasherPool::new(&VectorizedBackend));

/// The process-wide pool over the portable `sha2` backend.
pub fn standard_pool() -> &'static HasherPool {
    &STANDARD_POOL
}

/// The process-wide pool over the vectorized `ethereum_hashing` backend.
pub fn vectorized_pool() -> &'static HasherPool {
    &VECTORIZED_POOL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_returns_hasher() {
        let pool = HasherPool::new(&StandardBackend);
        {
            let mut h = pool.get();
            h.put_u64(1);
        }
        // The returned instance comes back reset.
        let h = pool.get();
        assert_eq!(h.index(), 0);
    }

    #[test]
    fn guard_returns_on_error_path() {
        let pool = HasherPool::new(&StandardBackend);
        let result: Result<(), ()> = (|| {
            let mut h = pool.get();
            h.put_u64(1);
            Err(())
        })();
        assert!(result.is_err());
        assert_eq!(pool.free.lock().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_borrows_get_distinct_instances() {
        let pool = standard_pool();
        let mut a = pool.get();
        let mut b = pool.get();
        a.put_u64(1);
        b.put_u64(2);
        assert_eq!(a.index(), 32);
        assert_eq!(b.index(), 32);
    }
}
