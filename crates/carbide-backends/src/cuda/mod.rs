//! CUDA driver backed by `cudarc`
//!
//! Memory management goes through cudarc's safe API (`alloc_zeros`,
//! `htod_sync_copy_into`, `dtoh_sync_copy_into`); modules, streams, events,
//! and launches use the `cudarc::driver::result` wrappers because kernel
//! argument lists here are built at runtime and the typed launch API wants a
//! compile-time tuple.

#![cfg(feature = "cuda")]

use std::ffi::c_void;
use std::sync::Arc;

use cudarc::driver::{result, sys, CudaDevice as CudarcDevice, CudaSlice, DevicePtr};
use parking_lot::Mutex;

use crate::driver::{KernelArg, NativeBuffer};
use crate::error::{DriverError, Result};
use crate::types::{DeviceFeature, DeviceInfo, LaunchShape};

fn cuda_err(op: &'static str) -> impl Fn(result::DriverError) -> DriverError {
    move |e| DriverError::Operation {
        op,
        code: e.0 as i64,
    }
}

/// Factory for CUDA devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaBackend;

impl CudaBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn is_available(&self) -> bool {
        CudarcDevice::count().map(|count| count > 0).unwrap_or(false)
    }

    pub fn device_count(&self) -> usize {
        CudarcDevice::count().map(|count| count as usize).unwrap_or(0)
    }

    pub fn create_device(&self, index: usize) -> Result<CudaDevice> {
        let device = CudarcDevice::new(index).map_err(|_| DriverError::InvalidHandle {
            kind: "device",
            id: index as u64,
        })?;
        Ok(CudaDevice { device })
    }
}

/// One CUDA device (primary context held by cudarc).
#[derive(Debug, Clone)]
pub struct CudaDevice {
    device: Arc<CudarcDevice>,
}

impl CudaDevice {
    pub fn info(&self) -> Result<DeviceInfo> {
        let name = self.device.name().map_err(cuda_err("cuDeviceGetName"))?;
        let (_free, total) = result::mem_get_info().map_err(cuda_err("cuMemGetInfo"))?;

        Ok(DeviceInfo {
            name,
            vendor: "NVIDIA".to_string(),
            memory_size: total as u64,
            features: vec![DeviceFeature::Fp16, DeviceFeature::Fp64],
        })
    }

    pub fn create_context(&self) -> CudaContext {
        CudaContext {
            device: Arc::clone(&self.device),
        }
    }
}

/// Allocation scope tied to one CUDA device.
#[derive(Debug, Clone)]
pub struct CudaContext {
    device: Arc<CudarcDevice>,
}

impl CudaContext {
    pub fn allocate(&self, size: u64) -> Result<CudaBuffer> {
        let slice = self
            .device
            .alloc_zeros::<u8>(size as usize)
            .map_err(|_| DriverError::OutOfMemory { requested: size })?;

        Ok(CudaBuffer {
            slice: Arc::new(Mutex::new(slice)),
            device: Arc::clone(&self.device),
            len: size,
        })
    }

    pub fn create_queue(&self) -> Result<CudaQueue> {
        let stream =
            result::stream::create(result::stream::StreamKind::NonBlocking).map_err(cuda_err("cuStreamCreate"))?;
        Ok(CudaQueue {
            stream,
            device: Arc::clone(&self.device),
        })
    }

    /// Load a module from a PTX or cubin image.
    pub fn load_module(&self, payload: &[u8]) -> Result<CudaModule> {
        self.device.bind_to_thread().map_err(cuda_err("cuCtxSetCurrent"))?;

        // cuModuleLoadData expects PTX text to be NUL-terminated.
        let mut image = payload.to_vec();
        image.push(0);

        let module = unsafe { result::module::load_data(image.as_ptr() as *const c_void) }
            .map_err(|e| DriverError::module_load(format!("cuModuleLoadData failed: {e}")))?;

        Ok(CudaModule {
            module,
            device: Arc::clone(&self.device),
        })
    }
}

/// Device memory handle.
#[derive(Debug, Clone)]
pub struct CudaBuffer {
    slice: Arc<Mutex<CudaSlice<u8>>>,
    device: Arc<CudarcDevice>,
    len: u64,
}

impl CudaBuffer {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn device_ptr(&self) -> sys::CUdeviceptr {
        *self.slice.lock().device_ptr()
    }

    pub fn read_into(&self, out: &mut [u8]) -> Result<()> {
        if out.len() as u64 > self.len {
            return Err(DriverError::TransferOutOfBounds {
                requested: out.len() as u64,
                capacity: self.len,
            });
        }

        let slice = self.slice.lock();
        let view = slice.slice(0..out.len());
        self.device
            .dtoh_sync_copy_into(&view, out)
            .map_err(|_| DriverError::operation("cuMemcpyDtoH", -1))
    }

    pub fn write_from(&self, data: &[u8]) -> Result<()> {
        if data.len() as u64 > self.len {
            return Err(DriverError::TransferOutOfBounds {
                requested: data.len() as u64,
                capacity: self.len,
            });
        }

        let mut slice = self.slice.lock();
        let mut view = slice.slice_mut(0..data.len());
        self.device
            .htod_sync_copy_into(data, &mut view)
            .map_err(|_| DriverError::operation("cuMemcpyHtoD", -1))
    }

    pub fn copy_from(&self, src: &CudaBuffer, bytes: u64) -> Result<()> {
        if bytes > src.len || bytes > self.len {
            return Err(DriverError::TransferOutOfBounds {
                requested: bytes,
                capacity: src.len.min(self.len),
            });
        }

        let src_slice = src.slice.lock();
        let mut dst_slice = self.slice.lock();
        let src_view = src_slice.slice(0..bytes as usize);
        let mut dst_view = dst_slice.slice_mut(0..bytes as usize);
        self.device
            .dtod_copy(&src_view, &mut dst_view)
            .map_err(|_| DriverError::operation("cuMemcpyDtoD", -1))
    }

    /// Drop this handle's reference; device memory is reclaimed by cudarc
    /// when the last clone goes away.
    pub fn release(self) -> Result<()> {
        Ok(())
    }
}

/// CUDA stream wrapper (in-order queue).
#[derive(Debug, Clone)]
pub struct CudaQueue {
    stream: sys::CUstream,
    device: Arc<CudarcDevice>,
}

// CUDA stream handles are process-wide and usable from any thread.
unsafe impl Send for CudaQueue {}
unsafe impl Sync for CudaQueue {}

impl CudaQueue {
    pub fn launch(&self, function: &CudaFunction, shape: &LaunchShape, args: &[KernelArg]) -> Result<()> {
        self.device.bind_to_thread().map_err(cuda_err("cuCtxSetCurrent"))?;

        // Per-argument byte images: the device pointer value for buffers, the
        // native-endian image for scalars. cuLaunchKernel receives a pointer
        // to each slot, in declaration order.
        let mut storage: Vec<Vec<u8>> = Vec::with_capacity(args.len());
        let mut live_buffers: Vec<CudaBuffer> = Vec::new();

        for arg in args {
            match arg {
                KernelArg::Buffer(NativeBuffer::Cuda(buffer)) => {
                    storage.push(buffer.device_ptr().to_ne_bytes().to_vec());
                    live_buffers.push(buffer.clone());
                }
                KernelArg::Buffer(other) => {
                    return Err(DriverError::BackendMismatch {
                        op: "launch",
                        expected: "CUDA",
                        actual: other.kind().formal_name(),
                    });
                }
                KernelArg::Scalar(scalar) => storage.push(scalar.ne_bytes()),
                KernelArg::Text(_) => {
                    return Err(DriverError::unsupported("CUDA", "string kernel arguments"));
                }
            }
        }

        let mut params: Vec<*mut c_void> = storage.iter_mut().map(|slot| slot.as_mut_ptr() as *mut c_void).collect();

        unsafe {
            result::launch_kernel(
                function.func,
                (shape.grid[0], shape.grid[1], shape.grid[2]),
                (shape.block[0], shape.block[1], shape.block[2]),
                shape.shared_mem_bytes,
                self.stream,
                &mut params,
            )
        }
        .map_err(cuda_err("cuLaunchKernel"))?;

        drop(live_buffers);
        Ok(())
    }

    pub fn synchronize(&self) -> Result<()> {
        unsafe { result::stream::synchronize(self.stream) }.map_err(cuda_err("cuStreamSynchronize"))
    }

    /// Record an event at the stream's current position.
    pub fn record_event(&self) -> Result<CudaEvent> {
        let event = result::event::create(sys::CUevent_flags::CU_EVENT_DISABLE_TIMING)
            .map_err(cuda_err("cuEventCreate"))?;
        unsafe { result::event::record(event, self.stream) }.map_err(cuda_err("cuEventRecord"))?;
        Ok(CudaEvent { event })
    }

    pub fn release(self) -> Result<()> {
        unsafe { result::stream::destroy(self.stream) }.map_err(cuda_err("cuStreamDestroy"))
    }
}

/// Loaded CUDA module.
#[derive(Debug)]
pub struct CudaModule {
    module: sys::CUmodule,
    device: Arc<CudarcDevice>,
}

// Module handles belong to the device's primary context, not a thread.
unsafe impl Send for CudaModule {}
unsafe impl Sync for CudaModule {}

impl CudaModule {
    pub fn function(&self, name: &str) -> Result<CudaFunction> {
        self.device.bind_to_thread().map_err(cuda_err("cuCtxSetCurrent"))?;

        let func = result::module::get_function(self.module, name).map_err(|_| DriverError::FunctionNotFound {
            name: name.to_string(),
        })?;

        Ok(CudaFunction {
            func,
            name: name.to_string(),
        })
    }
}

/// Kernel entry point inside a [`CudaModule`].
#[derive(Debug, Clone)]
pub struct CudaFunction {
    func: sys::CUfunction,
    name: String,
}

// Function handles are owned by the module's context, not a thread.
unsafe impl Send for CudaFunction {}
unsafe impl Sync for CudaFunction {}

impl CudaFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_work_group_size(&self) -> u32 {
        // Every compute capability the driver API supports guarantees 1024
        // threads per block.
        1024
    }
}

/// Completion handle recorded against a stream position.
#[derive(Debug)]
pub struct CudaEvent {
    event: sys::CUevent,
}

// CUDA event handles may be synchronized from any thread.
unsafe impl Send for CudaEvent {}

impl CudaEvent {
    pub fn synchronize(&self) -> Result<()> {
        unsafe { result::event::synchronize(self.event) }.map_err(cuda_err("cuEventSynchronize"))
    }

    pub fn release(self) -> Result<()> {
        unsafe { result::event::destroy(self.event) }.map_err(cuda_err("cuEventDestroy"))
    }
}
