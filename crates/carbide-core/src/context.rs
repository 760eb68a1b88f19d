//! Per-device factory for queues, buffers, and modules
//!
//! The context is the sole allocator for resources tied to one device.
//! Every `allocate_*` variant funnels through [`ComputeContext::allocate_bytes`]
//! followed by a host-to-device write for the initialized variants, so the
//! backend-specific allocation strategy lives in exactly one place.

use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use bytemuck::Pod;
use carbide_backends::{BackendKind, NativeContext};

use crate::arena::ComputeArena;
use crate::buffer::ComputeBuffer;
use crate::error::{Error, Result};
use crate::half;
use crate::memory::Freeable;
use crate::module::ComputeModule;
use crate::pool::MemoryPool;
use crate::queue::ComputeQueue;

/// Execution context for one device.
///
/// Clones are handles to the same underlying context.
#[derive(Debug, Clone)]
pub struct ComputeContext {
    shared: Arc<ContextShared>,
}

#[derive(Debug)]
struct ContextShared {
    kind: BackendKind,
    native: NativeContext,
}

impl ComputeContext {
    pub(crate) fn from_native(kind: BackendKind, native: NativeContext) -> Self {
        Self {
            shared: Arc::new(ContextShared { kind, native }),
        }
    }

    /// Backend this context belongs to
    pub fn backend_kind(&self) -> BackendKind {
        self.shared.kind
    }

    /// Create a new execution queue.
    pub fn create_queue(&self) -> Result<ComputeQueue> {
        let native = self.shared.native.create_queue()?;
        Ok(ComputeQueue::from_native(native))
    }

    /// Allocate an uninitialized buffer of `size` bytes.
    ///
    /// This is the single raw-allocation primitive; every other allocation
    /// variant goes through it. A native out-of-memory condition surfaces
    /// as [`Error::OutOfMemory`], distinct from other driver failures.
    #[tracing::instrument(skip(self), fields(backend = %self.shared.kind))]
    pub fn allocate_bytes(&self, size: u64) -> Result<ComputeBuffer> {
        let native = self.shared.native.allocate(size).map_err(Error::from_allocation)?;
        Ok(ComputeBuffer::from_native(self.clone(), native))
    }

    /// Allocate a buffer sized for `data` and write it (host-to-device).
    pub fn allocate_slice<T: Pod>(&self, data: &[T]) -> Result<ComputeBuffer> {
        let buffer = self.allocate_bytes(std::mem::size_of_val(data) as u64)?;
        buffer.write(data)?;
        Ok(buffer)
    }

    /// Allocate an FP16 buffer from `f32` data, narrowed through the half
    /// codec.
    pub fn allocate_half(&self, data: &[f32]) -> Result<ComputeBuffer> {
        self.allocate_slice(&half::float_to_half_vec(data))
    }

    /// Load a module from a file.
    pub fn load_module(&self, path: &Path) -> Result<ComputeModule> {
        let payload = std::fs::read(path).map_err(|source| Error::ModuleRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_module_bytes(&payload)
    }

    /// Load a module from a raw payload (binary or text).
    pub fn load_module_bytes(&self, payload: &[u8]) -> Result<ComputeModule> {
        let native = self.shared.native.load_module(payload)?;
        Ok(ComputeModule::from_native(native))
    }

    /// Load a module from text source.
    pub fn load_module_source(&self, source: &str) -> Result<ComputeModule> {
        self.load_module_bytes(source.as_bytes())
    }

    /// Create an arena for scope-based resource teardown.
    pub fn create_arena(&self) -> ComputeArena {
        ComputeArena::new(self.clone())
    }

    /// Create a keyed pool for buffer reuse.
    pub fn create_pool<K, V>(&self) -> MemoryPool<K, V>
    where
        K: Eq + Hash + Clone,
        V: Freeable,
    {
        MemoryPool::new()
    }
}
