//! Memory table for the host reference driver
//!
//! Allocations live in a handle-indexed table, mirroring how the GPU drivers
//! map opaque handles to driver-owned objects. Handles are monotonically
//! increasing and never reused, so a stale handle always misses the table
//! instead of silently resolving to a newer allocation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DriverError, Result};

/// Backing storage for one host allocation.
///
/// Kernels lock individual allocations rather than the whole table, so two
/// launches touching disjoint buffers do not serialize on the table lock.
pub(crate) type HostAllocation = Arc<Mutex<Vec<u8>>>;

#[derive(Debug)]
struct Tables {
    buffers: HashMap<u64, HostAllocation>,
    next_buffer_id: u64,
}

/// Handle-indexed allocation table shared by every object of one host context.
#[derive(Debug)]
pub(crate) struct HostMemory {
    inner: Mutex<Tables>,
}

impl HostMemory {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Tables {
                buffers: HashMap::new(),
                next_buffer_id: 1,
            }),
        }
    }

    /// Allocate a zero-initialized buffer and return its handle
    pub(crate) fn allocate(&self, size: u64) -> Result<u64> {
        let size = usize::try_from(size).map_err(|_| DriverError::OutOfMemory { requested: size })?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(size)
            .map_err(|_| DriverError::OutOfMemory { requested: size as u64 })?;
        storage.resize(size, 0);

        let mut tables = self.inner.lock();
        let id = tables.next_buffer_id;
        tables.next_buffer_id += 1;
        tables.buffers.insert(id, Arc::new(Mutex::new(storage)));

        Ok(id)
    }

    /// Remove an allocation from the table
    pub(crate) fn free(&self, id: u64) -> Result<()> {
        self.inner
            .lock()
            .buffers
            .remove(&id)
            .map(|_| ())
            .ok_or(DriverError::InvalidHandle { kind: "buffer", id })
    }

    /// Resolve a handle to its backing allocation
    pub(crate) fn get(&self, id: u64) -> Result<HostAllocation> {
        self.inner
            .lock()
            .buffers
            .get(&id)
            .cloned()
            .ok_or(DriverError::InvalidHandle { kind: "buffer", id })
    }

    #[cfg(test)]
    pub(crate) fn live_count(&self) -> usize {
        self.inner.lock().buffers.len()
    }
}

// ================================================================================================
// Tests
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_free() {
        let memory = HostMemory::new();

        let id = memory.allocate(1024).unwrap();
        assert_eq!(memory.get(id).unwrap().lock().len(), 1024);
        assert_eq!(memory.live_count(), 1);

        memory.free(id).unwrap();
        assert_eq!(memory.live_count(), 0);
        assert!(matches!(memory.get(id), Err(DriverError::InvalidHandle { .. })));
    }

    #[test]
    fn handles_are_never_reused() {
        let memory = HostMemory::new();

        let first = memory.allocate(8).unwrap();
        memory.free(first).unwrap();

        let second = memory.allocate(8).unwrap();
        assert_ne!(first, second);
        assert!(memory.get(first).is_err());
    }

    #[test]
    fn double_free_reports_invalid_handle() {
        let memory = HostMemory::new();

        let id = memory.allocate(16).unwrap();
        memory.free(id).unwrap();

        match memory.free(id) {
            Err(DriverError::InvalidHandle { kind, id: bad }) => {
                assert_eq!(kind, "buffer");
                assert_eq!(bad, id);
            }
            other => panic!("expected InvalidHandle, got {other:?}"),
        }
    }

    #[test]
    fn allocations_are_zero_initialized() {
        let memory = HostMemory::new();

        let id = memory.allocate(64).unwrap();
        let allocation = memory.get(id).unwrap();
        assert!(allocation.lock().iter().all(|&b| b == 0));
    }
}
