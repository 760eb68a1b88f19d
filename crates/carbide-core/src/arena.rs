//! Scoped aggregate ownership of compute resources
//!
//! An arena registers every resource created through it and releases them in
//! strict reverse-registration order on close, so resources created as
//! backend-internal children of earlier allocations are torn down before
//! their dependencies. Teardown continues past individual release failures
//! (a single stuck resource must not leak the rest) and reports every
//! failure at the end.

use crate::buffer::ComputeBuffer;
use crate::context::ComputeContext;
use crate::error::{Error, Result};
use crate::memory::Freeable;
use crate::queue::ComputeQueue;

use bytemuck::Pod;

/// Allocation arena that owns and frees compute resources.
///
/// Resources created via the arena's convenience methods (or registered with
/// [`ComputeArena::retain`]) are released when the arena is closed or
/// dropped, whichever comes first.
pub struct ComputeArena {
    context: ComputeContext,
    retained: Vec<Box<dyn Freeable>>,
    closed: bool,
}

impl ComputeArena {
    pub(crate) fn new(context: ComputeContext) -> Self {
        Self {
            context,
            retained: Vec::new(),
            closed: false,
        }
    }

    /// Register a resource and hand it back, enabling fluent allocation
    /// chains.
    pub fn retain<T>(&mut self, resource: T) -> T
    where
        T: Freeable + Clone + 'static,
    {
        self.retained.push(Box::new(resource.clone()));
        resource
    }

    /// Create a queue and register it.
    pub fn create_queue(&mut self) -> Result<ComputeQueue> {
        let queue = self.context.create_queue()?;
        Ok(self.retain(queue))
    }

    /// Allocate an uninitialized buffer and register it.
    pub fn allocate_bytes(&mut self, size: u64) -> Result<ComputeBuffer> {
        let buffer = self.context.allocate_bytes(size)?;
        Ok(self.retain(buffer))
    }

    /// Allocate an initialized buffer and register it.
    pub fn allocate_slice<T: Pod>(&mut self, data: &[T]) -> Result<ComputeBuffer> {
        let buffer = self.context.allocate_slice(data)?;
        Ok(self.retain(buffer))
    }

    /// Allocate an FP16 buffer from `f32` data and register it.
    pub fn allocate_half(&mut self, data: &[f32]) -> Result<ComputeBuffer> {
        let buffer = self.context.allocate_half(data)?;
        Ok(self.retain(buffer))
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Release every registered resource in reverse registration order.
    ///
    /// Release failures do not abort the walk; they are collected and
    /// reported together. Closing an already-closed arena is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut failures = Vec::new();
        for resource in self.retained.drain(..).rev() {
            if let Err(error) = resource.free() {
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

impl Drop for ComputeArena {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::error!(%error, "arena teardown reported failures");
        }
    }
}

impl std::fmt::Debug for ComputeArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeArena")
            .field("retained", &self.retained.len())
            .field("closed", &self.closed)
            .finish()
    }
}

// ================================================================================================
// Tests
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryState;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records the order its instances are freed in.
    #[derive(Clone)]
    struct Tracked {
        id: usize,
        order: Arc<Mutex<Vec<usize>>>,
        freed: Arc<AtomicBool>,
        fail_on_free: bool,
    }

    impl Tracked {
        fn new(id: usize, order: &Arc<Mutex<Vec<usize>>>) -> Self {
            Self {
                id,
                order: Arc::clone(order),
                freed: Arc::new(AtomicBool::new(false)),
                fail_on_free: false,
            }
        }

        fn failing(id: usize, order: &Arc<Mutex<Vec<usize>>>) -> Self {
            Self {
                fail_on_free: true,
                ..Self::new(id, order)
            }
        }
    }

    impl Freeable for Tracked {
        fn resource_kind(&self) -> &'static str {
            "Tracked"
        }

        fn state(&self) -> MemoryState {
            if self.freed.load(Ordering::SeqCst) {
                MemoryState::Free
            } else {
                MemoryState::Alive
            }
        }

        fn free(&self) -> Result<()> {
            if self.freed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            self.order.lock().unwrap().push(self.id);
            if self.fail_on_free {
                return Err(Error::NoBackend);
            }
            Ok(())
        }
    }

    fn arena() -> ComputeArena {
        let registry = crate::registry::BackendRegistry::new();
        let device = registry.create_device().unwrap();
        device.create_context().create_arena()
    }

    #[test]
    fn close_releases_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut arena = arena();

        for id in 1..=3 {
            arena.retain(Tracked::new(id, &order));
        }
        arena.close().unwrap();

        assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn retain_returns_the_same_resource() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut arena = arena();

        let resource = arena.retain(Tracked::new(7, &order));
        assert!(resource.is_alive());
        assert_eq!(arena.len(), 1);

        arena.close().unwrap();
        assert!(!resource.is_alive());
    }

    #[test]
    fn close_is_idempotent() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut arena = arena();
        arena.retain(Tracked::new(1, &order));

        arena.close().unwrap();
        arena.close().unwrap();

        assert_eq!(order.lock().unwrap().len(), 1);
    }

    #[test]
    fn teardown_continues_past_failures() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut arena = arena();

        arena.retain(Tracked::new(1, &order));
        arena.retain(Tracked::failing(2, &order));
        arena.retain(Tracked::new(3, &order));

        match arena.close() {
            Err(Error::Teardown { failures }) => assert_eq!(failures.len(), 1),
            other => panic!("expected Teardown, got {other:?}"),
        }
        // Every resource was still visited, in reverse order.
        assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn drop_closes_the_arena() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let resource = {
            let mut arena = arena();
            arena.retain(Tracked::new(42, &order))
        };
        assert!(!resource.is_alive());
        assert_eq!(*order.lock().unwrap(), vec![42]);
    }
}
