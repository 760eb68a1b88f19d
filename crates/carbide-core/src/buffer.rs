//! Device memory buffers with typed host transfers
//!
//! A `ComputeBuffer` pairs a native allocation with the two-state lifecycle
//! from [`crate::memory`]. Cloning a `ComputeBuffer` is cheap and yields a
//! handle to the same device allocation (so a buffer can be held by an
//! arena, a pool, and an argument list at once); freeing through any handle
//! retires all of them.
//!
//! Host transfers are generic over `bytemuck::Pod` element types. Transfers
//! larger than the buffer fail before any native call; reads into a smaller
//! host slice fetch a prefix. Underflow is permitted, overflow is not.

use std::fmt;
use std::time::Instant;

use bytemuck::Pod;
use carbide_backends::NativeBuffer;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::context::ComputeContext;
use crate::error::{Error, Result};
use crate::half;
use crate::memory::{Freeable, MemoryState, Slot};

/// A `Freeable` device memory handle with typed host-transfer operations.
#[derive(Clone)]
pub struct ComputeBuffer {
    shared: Arc<BufferShared>,
}

struct BufferShared {
    context: ComputeContext,
    len: u64,
    slot: Mutex<Slot<NativeBuffer>>,
}

impl ComputeBuffer {
    pub(crate) fn from_native(context: ComputeContext, native: NativeBuffer) -> Self {
        let len = native.len();
        Self {
            shared: Arc::new(BufferShared {
                context,
                len,
                slot: Mutex::new(Slot::Alive(native)),
            }),
        }
    }

    /// Byte length, immutable for the lifetime of the buffer
    pub fn len(&self) -> u64 {
        self.shared.len
    }

    pub fn is_empty(&self) -> bool {
        self.shared.len == 0
    }

    /// The context this buffer was allocated from
    pub fn context(&self) -> &ComputeContext {
        &self.shared.context
    }

    pub(crate) fn native(&self) -> Result<NativeBuffer> {
        self.shared.slot.lock().cloned("ComputeBuffer")
    }

    /// Copy `data` into the buffer (host-to-device).
    ///
    /// Writing more bytes than the buffer holds fails with an out-of-range
    /// error and no partial write occurs.
    #[tracing::instrument(skip(self, data), fields(bytes = std::mem::size_of_val(data), capacity = self.shared.len))]
    pub fn write<T: Pod>(&self, data: &[T]) -> Result<()> {
        let requested = std::mem::size_of_val(data) as u64;
        if requested > self.shared.len {
            return Err(Error::OutOfRange {
                op: "write",
                requested,
                capacity: self.shared.len,
            });
        }

        let start = Instant::now();
        let native = self.native()?;
        native.write_from(bytemuck::cast_slice(data))?;

        tracing::debug!(
            duration_us = start.elapsed().as_micros() as u64,
            bytes = requested,
            direction = "H2D",
            "buffer_write"
        );
        Ok(())
    }

    /// Read the buffer prefix into `out` (device-to-host).
    ///
    /// Reading into a host slice larger than the buffer fails with an
    /// out-of-range error; a smaller host slice receives a prefix of the
    /// buffer's contents.
    #[tracing::instrument(skip(self, out), fields(bytes = std::mem::size_of_val(out), capacity = self.shared.len))]
    pub fn get<T: Pod>(&self, out: &mut [T]) -> Result<()> {
        let requested = std::mem::size_of_val(out) as u64;
        if requested > self.shared.len {
            return Err(Error::OutOfRange {
                op: "read",
                requested,
                capacity: self.shared.len,
            });
        }

        let start = Instant::now();
        let native = self.native()?;
        native.read_into(bytemuck::cast_slice_mut(out))?;

        tracing::debug!(
            duration_us = start.elapsed().as_micros() as u64,
            bytes = requested,
            direction = "D2H",
            "buffer_get"
        );
        Ok(())
    }

    /// Read an FP16 buffer into `f32` host data through the half codec.
    pub fn get_half(&self, out: &mut [f32]) -> Result<()> {
        let mut bits = vec![0u16; out.len()];
        self.get(&mut bits)?;
        half::half_to_float_slice(&bits, out);
        Ok(())
    }

    /// Allocate a new buffer of the same length and copy this one into it.
    pub fn duplicate(&self) -> Result<ComputeBuffer> {
        self.ensure_alive()?;
        let copy = self.shared.context.allocate_bytes(self.shared.len)?;
        self.copy_into(&copy)?;
        Ok(copy)
    }

    /// Copy this buffer's contents into `other` (device-to-device).
    ///
    /// `other` must be at least as long as this buffer and must be alive;
    /// both checks happen before any native call.
    pub fn copy_into(&self, other: &ComputeBuffer) -> Result<()> {
        self.ensure_alive()?;
        self.ensure_other(other)?;

        if self.shared.len > other.shared.len {
            return Err(Error::OutOfRange {
                op: "device copy",
                requested: self.shared.len,
                capacity: other.shared.len,
            });
        }

        let src = self.native()?;
        let dst = other.native()?;
        dst.copy_from(&src, self.shared.len)?;
        Ok(())
    }
}

impl Freeable for ComputeBuffer {
    fn resource_kind(&self) -> &'static str {
        "ComputeBuffer"
    }

    fn state(&self) -> MemoryState {
        self.shared.slot.lock().state()
    }

    fn free(&self) -> Result<()> {
        let native = match self.shared.slot.lock().take() {
            Some(native) => native,
            None => return Ok(()), // already freed
        };
        native.release()?;
        Ok(())
    }
}

impl fmt::Debug for ComputeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeBuffer")
            .field("len", &self.shared.len)
            .field("state", &self.state())
            .finish()
    }
}
