//! Metal driver for Apple GPUs
//!
//! Buffers use `MTLResourceOptions::StorageModeShared` so host transfers are
//! plain memory copies through `contents()`. Launches encode one compute
//! pass per dispatch: pipeline state, positional buffer/byte bindings, then
//! `dispatch_thread_groups` with the shape the core derived.

#![cfg(target_vendor = "apple")]

use metal::{
    Buffer as MtlBuffer, CommandBuffer, CommandQueue, CompileOptions, ComputePipelineState, Device, Library,
    MTLCommandBufferStatus, MTLResourceOptions, MTLSize,
};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::driver::{KernelArg, NativeBuffer};
use crate::error::{DriverError, Result};
use crate::types::{DeviceFeature, DeviceInfo, LaunchShape};

/// Factory for Metal devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetalBackend;

impl MetalBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn is_available(&self) -> bool {
        !Device::all().is_empty()
    }

    pub fn device_count(&self) -> usize {
        Device::all().len()
    }

    pub fn create_device(&self, index: usize) -> Result<MetalDevice> {
        Device::all()
            .into_iter()
            .nth(index)
            .map(|device| MetalDevice { device })
            .ok_or(DriverError::InvalidHandle {
                kind: "device",
                id: index as u64,
            })
    }
}

/// One Metal GPU.
#[derive(Debug, Clone)]
pub struct MetalDevice {
    device: Device,
}

impl MetalDevice {
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: self.device.name().to_string(),
            vendor: "Apple".to_string(),
            memory_size: self.device.recommended_max_working_set_size(),
            // Metal has no double-precision arithmetic.
            features: vec![DeviceFeature::Fp16],
        }
    }

    pub fn create_context(&self) -> MetalContext {
        MetalContext {
            device: self.device.clone(),
        }
    }
}

/// Allocation scope tied to one Metal device.
#[derive(Debug, Clone)]
pub struct MetalContext {
    device: Device,
}

impl MetalContext {
    pub fn allocate(&self, size: u64) -> Result<MetalBuffer> {
        let buffer = self.device.new_buffer(size, MTLResourceOptions::StorageModeShared);
        Ok(MetalBuffer { buffer, len: size })
    }

    pub fn create_queue(&self) -> Result<MetalQueue> {
        Ok(MetalQueue {
            queue: self.device.new_command_queue(),
            last: Arc::new(Mutex::new(None)),
        })
    }

    /// Load a module from MSL source text or a compiled metallib image.
    pub fn load_module(&self, payload: &[u8]) -> Result<MetalModule> {
        let library: Library = match std::str::from_utf8(payload) {
            Ok(source) => self
                .device
                .new_library_with_source(source, &CompileOptions::new())
                .map_err(|e| DriverError::module_load(format!("MSL compilation failed: {e}")))?,
            Err(_) => self
                .device
                .new_library_with_data(payload)
                .map_err(|e| DriverError::module_load(format!("metallib load failed: {e}")))?,
        };

        Ok(MetalModule {
            device: self.device.clone(),
            library,
        })
    }
}

/// Shared-storage device buffer.
#[derive(Debug, Clone)]
pub struct MetalBuffer {
    buffer: MtlBuffer,
    len: u64,
}

impl MetalBuffer {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn read_into(&self, out: &mut [u8]) -> Result<()> {
        if out.len() as u64 > self.len {
            return Err(DriverError::TransferOutOfBounds {
                requested: out.len() as u64,
                capacity: self.len,
            });
        }

        unsafe {
            let contents = self.buffer.contents() as *const u8;
            std::ptr::copy_nonoverlapping(contents, out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    pub fn write_from(&self, data: &[u8]) -> Result<()> {
        if data.len() as u64 > self.len {
            return Err(DriverError::TransferOutOfBounds {
                requested: data.len() as u64,
                capacity: self.len,
            });
        }

        unsafe {
            let contents = self.buffer.contents() as *mut u8;
            std::ptr::copy_nonoverlapping(data.as_ptr(), contents, data.len());
        }
        Ok(())
    }

    /// Device-to-device copy through unified memory.
    pub fn copy_from(&self, src: &MetalBuffer, bytes: u64) -> Result<()> {
        if bytes > src.len || bytes > self.len {
            return Err(DriverError::TransferOutOfBounds {
                requested: bytes,
                capacity: src.len.min(self.len),
            });
        }

        unsafe {
            let src_ptr = src.buffer.contents() as *const u8;
            let dst_ptr = self.buffer.contents() as *mut u8;
            std::ptr::copy_nonoverlapping(src_ptr, dst_ptr, bytes as usize);
        }
        Ok(())
    }

    pub fn release(self) -> Result<()> {
        // The MTLBuffer is reclaimed when the last retained clone drops.
        Ok(())
    }
}

/// Command queue; tracks the last committed command buffer for
/// synchronization and event recording.
#[derive(Clone)]
pub struct MetalQueue {
    queue: CommandQueue,
    last: Arc<Mutex<Option<CommandBuffer>>>,
}

// MTLCommandQueue and MTLCommandBuffer are documented thread-safe.
unsafe impl Send for MetalQueue {}
unsafe impl Sync for MetalQueue {}

impl MetalQueue {
    pub fn launch(&self, function: &MetalFunction, shape: &LaunchShape, args: &[KernelArg]) -> Result<()> {
        let command_buffer = self.queue.new_command_buffer().to_owned();
        let encoder = command_buffer.new_compute_command_encoder();

        encoder.set_compute_pipeline_state(&function.pipeline);

        let mut scalar_slots: Vec<Vec<u8>> = Vec::new();
        for (index, arg) in args.iter().enumerate() {
            match arg {
                KernelArg::Buffer(NativeBuffer::Metal(buffer)) => {
                    encoder.set_buffer(index as u64, Some(&buffer.buffer), 0);
                }
                KernelArg::Buffer(other) => {
                    encoder.end_encoding();
                    return Err(DriverError::BackendMismatch {
                        op: "launch",
                        expected: "Metal",
                        actual: other.kind().formal_name(),
                    });
                }
                KernelArg::Scalar(scalar) => {
                    let bytes = scalar.ne_bytes();
                    encoder.set_bytes(index as u64, bytes.len() as u64, bytes.as_ptr() as *const _);
                    scalar_slots.push(bytes);
                }
                KernelArg::Text(text) => {
                    let mut bytes = text.as_bytes().to_vec();
                    bytes.push(0);
                    encoder.set_bytes(index as u64, bytes.len() as u64, bytes.as_ptr() as *const _);
                    scalar_slots.push(bytes);
                }
            }
        }

        encoder.dispatch_thread_groups(
            MTLSize::new(shape.grid[0] as u64, shape.grid[1] as u64, shape.grid[2] as u64),
            MTLSize::new(shape.block[0] as u64, shape.block[1] as u64, shape.block[2] as u64),
        );
        encoder.end_encoding();

        command_buffer.commit();
        drop(scalar_slots);

        *self.last.lock() = Some(command_buffer);
        Ok(())
    }

    pub fn synchronize(&self) -> Result<()> {
        let last = self.last.lock().take();
        if let Some(command_buffer) = last {
            command_buffer.wait_until_completed();
            if command_buffer.status() == MTLCommandBufferStatus::Error {
                return Err(DriverError::operation("MTLCommandBuffer", -1));
            }
        }
        Ok(())
    }

    /// Record the queue's current position: the last committed command buffer.
    pub fn record_event(&self) -> Result<MetalEvent> {
        Ok(MetalEvent {
            command_buffer: self.last.lock().clone(),
        })
    }

    pub fn release(self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MetalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetalQueue").finish_non_exhaustive()
    }
}

/// Compiled shader library.
#[derive(Debug)]
pub struct MetalModule {
    device: Device,
    library: Library,
}

unsafe impl Send for MetalModule {}
unsafe impl Sync for MetalModule {}

impl MetalModule {
    pub fn function(&self, name: &str) -> Result<MetalFunction> {
        let function = self
            .library
            .get_function(name, None)
            .map_err(|_| DriverError::FunctionNotFound { name: name.to_string() })?;

        let pipeline = self
            .device
            .new_compute_pipeline_state_with_function(&function)
            .map_err(|e| DriverError::module_load(format!("pipeline creation for '{name}' failed: {e}")))?;

        Ok(MetalFunction {
            name: name.to_string(),
            pipeline,
        })
    }
}

/// Pipeline state for one kernel entry point.
#[derive(Debug, Clone)]
pub struct MetalFunction {
    name: String,
    pipeline: ComputePipelineState,
}

unsafe impl Send for MetalFunction {}
unsafe impl Sync for MetalFunction {}

impl MetalFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_work_group_size(&self) -> u32 {
        self.pipeline.max_total_threads_per_threadgroup() as u32
    }
}

/// Completion handle over the command buffer recorded at dispatch.
#[derive(Debug)]
pub struct MetalEvent {
    command_buffer: Option<CommandBuffer>,
}

// MTLCommandBuffer completion may be awaited from any thread.
unsafe impl Send for MetalEvent {}

impl MetalEvent {
    pub fn synchronize(&self) -> Result<()> {
        if let Some(command_buffer) = &self.command_buffer {
            command_buffer.wait_until_completed();
            if command_buffer.status() == MTLCommandBufferStatus::Error {
                return Err(DriverError::operation("MTLCommandBuffer", -1));
            }
        }
        Ok(())
    }

    pub fn release(self) -> Result<()> {
        Ok(())
    }
}
