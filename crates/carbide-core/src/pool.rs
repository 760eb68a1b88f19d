//! Keyed cache of retired, still-alive resources
//!
//! Retiring a buffer into the pool does not free it; ownership transfers to
//! the pool and the buffer stays alive for the next acquisition under the
//! same key. The pool never validates shape compatibility beyond key
//! equality — reusing a buffer under the wrong key is a caller contract
//! violation, not an enforced invariant.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::ops::Deref;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::memory::Freeable;

/// Keyed pool that reuses values across allocation/free cycles.
///
/// Values are grouped by a structurally comparable key and returned to the
/// pool through [`Pooled::close`] (or drop).
pub struct MemoryPool<K, V>
where
    K: Eq + Hash + Clone,
    V: Freeable,
{
    free: Mutex<HashMap<K, VecDeque<V>>>,
}

impl<K, V> MemoryPool<K, V>
where
    K: Eq + Hash + Clone,
    V: Freeable,
{
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            free: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a value for `key`, reusing a retired instance if one exists.
    ///
    /// `allocator` runs only when the free-list for `key` is empty.
    pub fn acquire<F>(&self, key: K, allocator: F) -> Result<Pooled<'_, K, V>>
    where
        F: FnOnce() -> Result<V>,
    {
        let reused = self.free.lock().get_mut(&key).and_then(VecDeque::pop_front);

        let value = match reused {
            Some(value) => {
                tracing::trace!("pool_reuse");
                value
            }
            None => allocator()?,
        };

        Ok(Pooled {
            pool: self,
            key: Some(key),
            value: Some(value),
        })
    }

    fn release(&self, key: K, value: V) {
        self.free.lock().entry(key).or_default().push_back(value);
    }

    /// Number of retired values currently cached
    pub fn idle_count(&self) -> usize {
        self.free.lock().values().map(VecDeque::len).sum()
    }

    /// Drain every free-list and free every cached value.
    ///
    /// Intended for teardown at context shutdown, not for ordinary reuse
    /// cycles. Like arena teardown, the walk continues past individual
    /// release failures and reports them together.
    pub fn free(&self) -> Result<()> {
        let drained: Vec<V> = {
            let mut free = self.free.lock();
            free.drain().flat_map(|(_, values)| values).collect()
        };

        let mut failures = Vec::new();
        for value in drained {
            if let Err(error) = value.free() {
                failures.push(error);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown { failures })
        }
    }
}

impl<K, V> Default for MemoryPool<K, V>
where
    K: Eq + Hash + Clone,
    V: Freeable,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for MemoryPool<K, V>
where
    K: Eq + Hash + Clone,
    V: Freeable,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool").field("idle", &self.idle_count()).finish()
    }
}

/// A value borrowed from a [`MemoryPool`].
///
/// Returns the value to the pool exactly once, on [`Pooled::close`] or drop.
pub struct Pooled<'pool, K, V>
where
    K: Eq + Hash + Clone,
    V: Freeable,
{
    pool: &'pool MemoryPool<K, V>,
    key: Option<K>,
    value: Option<V>,
}

impl<K, V> Pooled<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Freeable,
{
    /// Return the value to the pool.
    pub fn close(mut self) {
        self.return_to_pool();
    }

    fn return_to_pool(&mut self) {
        // One-shot: both options drain together on the first call.
        if let (Some(key), Some(value)) = (self.key.take(), self.value.take()) {
            self.pool.release(key, value);
        }
    }
}

impl<K, V> Deref for Pooled<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Freeable,
{
    type Target = V;

    fn deref(&self) -> &V {
        self.value.as_ref().expect("pooled value present until release")
    }
}

impl<K, V> Drop for Pooled<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Freeable,
{
    fn drop(&mut self) {
        self.return_to_pool();
    }
}

// ================================================================================================
// Tests
// ================================================================================================
