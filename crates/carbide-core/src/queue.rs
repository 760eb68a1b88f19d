//! Execution queues and the dispatch protocol
//!
//! A dispatch packages a function, two extents, and an argument list into a
//! single enqueue on an in-order queue:
//!
//! 1. assert the queue is alive
//! 2. validate the group size has a non-zero total
//! 3. derive the effective local size as the component-wise minimum of the
//!    global and requested group sizes
//! 4. derive grid counts as `ceil(global / effective_local)` per axis —
//!    ceiling division on every backend, so partial trailing groups are
//!    launched rather than dropped
//! 5. marshal the argument list, re-checking buffer aliveness
//! 6. invoke the native launch; a failure status always surfaces
//!
//! Operations submitted to the same queue complete in submission order;
//! queues give no ordering guarantee relative to each other. There is no
//! cancellation or timeout path.

use std::sync::Arc;

use carbide_backends::{KernelArg, LaunchShape, NativeQueue};
use parking_lot::Mutex;

use crate::args::{ArgValue, ComputeArgs};
use crate::error::{Error, Result};
use crate::event::ComputeEvent;
use crate::memory::{Freeable, MemoryState, Slot};
use crate::module::ComputeFunction;
use crate::size::ComputeSize;

/// A `Freeable` in-order dispatch queue.
///
/// Clones are handles to the same native queue.
#[derive(Clone)]
pub struct ComputeQueue {
    shared: Arc<QueueShared>,
}

struct QueueShared {
    slot: Mutex<Slot<NativeQueue>>,
}

impl ComputeQueue {
    pub(crate) fn from_native(native: NativeQueue) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                slot: Mutex::new(Slot::Alive(native)),
            }),
        }
    }

    fn native(&self) -> Result<NativeQueue> {
        self.shared.slot.lock().cloned("ComputeQueue")
    }

    /// Dispatch a kernel and block until the driver reports completion.
    #[tracing::instrument(skip(self, function, args), fields(kernel = function.name()))]
    pub fn dispatch(
        &self,
        function: &ComputeFunction,
        global_size: ComputeSize,
        group_size: ComputeSize,
        args: &ComputeArgs,
    ) -> Result<()> {
        let native = self.enqueue(function, global_size, group_size, args)?;
        native.synchronize()?;
        Ok(())
    }

    /// Dispatch a kernel and return immediately with a completion event.
    #[tracing::instrument(skip(self, function, args), fields(kernel = function.name()))]
    pub fn dispatch_async(
        &self,
        function: &ComputeFunction,
        global_size: ComputeSize,
        group_size: ComputeSize,
        args: &ComputeArgs,
    ) -> Result<ComputeEvent> {
        let native = self.enqueue(function, global_size, group_size, args)?;
        let event = native.record_event()?;
        Ok(ComputeEvent::spawn(event))
    }

    fn enqueue(
        &self,
        function: &ComputeFunction,
        global_size: ComputeSize,
        group_size: ComputeSize,
        args: &ComputeArgs,
    ) -> Result<NativeQueue> {
        let native = self.native()?;

        if group_size.total() == 0 {
            return Err(Error::EmptyGroup);
        }

        let shape = derive_shape(global_size, group_size);
        let kernel_args = marshal(args)?;

        native.launch(function.native(), &shape, &kernel_args)?;

        tracing::debug!(
            kernel = function.name(),
            %shape,
            args = kernel_args.len(),
            "dispatch_enqueued"
        );
        Ok(native)
    }

    /// Block until everything submitted to this queue has completed.
    ///
    /// Fails immediately if the queue is not alive.
    pub fn synchronize(&self) -> Result<()> {
        let native = self.native()?;
        native.synchronize()?;
        Ok(())
    }
}

impl Freeable for ComputeQueue {
    fn resource_kind(&self) -> &'static str {
        "ComputeQueue"
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

impl std::fmt::Debug for ComputeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeQueue").field("state", &self.state()).finish()
    }
}

/// Effective local size and ceiling-divided grid counts for a dispatch.
fn derive_shape(global: ComputeSize, group: ComputeSize) -> LaunchShape {
    // A group larger than the problem would launch idle invocations on some
    // drivers and is rejected outright on others; clamp it per axis.
    let local = global.component_min(&group);

    let global = global.as_array();
    let local = local.as_array();

    LaunchShape {
        grid: [
            global[0].div_ceil(local[0]),
            global[1].div_ceil(local[1]),
            global[2].div_ceil(local[2]),
        ],
        block: local,
        shared_mem_bytes: 0,
    }
}

/// Convert the validated argument list into the native convention,
/// re-checking that every buffer is still alive at dispatch time.
fn marshal(args: &ComputeArgs) -> Result<Vec<KernelArg>> {
    args.values()
        .iter()
        .enumerate()
        .map(|(position, value)| match value {
            ArgValue::Buffer(buffer) => buffer
                .native()
                .map(KernelArg::Buffer)
                .map_err(|_| Error::DeadArgument { position }),
            ArgValue::Scalar(scalar) => Ok(KernelArg::Scalar(*scalar)),
            ArgValue::Text(text) => Ok(KernelArg::Text(text.clone())),
        })
        .collect()
}

// ================================================================================================
// Tests
// ================================================================================================
