//! Closed sum types over the compiled-in drivers
//!
//! Each native object kind (backend, device, context, queue, buffer, module,
//! function, event) is a tagged variant over the drivers compiled into this
//! build. Every delegation site matches exhaustively, so adding a backend is
//! a compile-time-checked exercise: a new variant here breaks every match
//! that has not grown an arm for it. There is no default/unexpected-value
//! path anywhere in the dispatch plumbing.

#[cfg(feature = "cuda")]
use crate::cuda::{CudaBackend, CudaBuffer, CudaContext, CudaDevice, CudaEvent, CudaFunction, CudaModule, CudaQueue};
#[cfg(any(feature = "cuda", target_vendor = "apple"))]
use crate::error::DriverError;
use crate::error::Result;
use crate::host::{HostBackend, HostBuffer, HostContext, HostDevice, HostEvent, HostFunction, HostModule, HostQueue};
#[cfg(target_vendor = "apple")]
use crate::metal::{
    MetalBackend, MetalBuffer, MetalContext, MetalDevice, MetalEvent, MetalFunction, MetalModule, MetalQueue,
};
use crate::types::{BackendKind, DeviceInfo, LaunchShape, Scalar};

/// One argument handed to a native launch, in declaration order.
///
/// Built by the core's marshaller from its validated argument list; consumed
/// by each driver's launch encoding (per-slot binding on Metal, packed
/// pointer array on CUDA, direct resolution on the host driver).
#[derive(Debug, Clone)]
pub enum KernelArg {
    /// Pointer-sized slot referencing device memory
    Buffer(NativeBuffer),
    /// Natively-sized scalar slot
    Scalar(Scalar),
    /// NUL-terminated text slot, for drivers that accept it
    Text(String),
}

/// A compiled-in driver, before device selection.
#[derive(Debug, Clone)]
pub enum NativeBackend {
    #[cfg(feature = "cuda")]
    Cuda(CudaBackend),
    #[cfg(target_vendor = "apple")]
    Metal(MetalBackend),
    Host(HostBackend),
}

impl NativeBackend {
    /// Every driver compiled into this build, in priority order.
    pub fn candidates() -> Vec<NativeBackend> {
        let mut candidates = Vec::new();
        #[cfg(feature = "cuda")]
        candidates.push(NativeBackend::Cuda(CudaBackend::new()));
        #[cfg(target_vendor = "apple")]
        candidates.push(NativeBackend::Metal(MetalBackend::new()));
        candidates.push(NativeBackend::Host(HostBackend::new()));
        candidates
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => BackendKind::Cuda,
            #[cfg(target_vendor = "apple")]
            Self::Metal(_) => BackendKind::Metal,
            Self::Host(_) => BackendKind::Host,
        }
    }

    /// Whether the driver can actually reach a device on this system.
    pub fn is_available(&self) -> bool {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(backend) => backend.is_available(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(backend) => backend.is_available(),
            Self::Host(backend) => backend.is_available(),
        }
    }

    pub fn device_count(&self) -> usize {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(backend) => backend.device_count(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(backend) => backend.device_count(),
            Self::Host(backend) => backend.device_count(),
        }
    }

    pub fn create_device(&self, index: usize) -> Result<NativeDevice> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(backend) => backend.create_device(index).map(NativeDevice::Cuda),
            #[cfg(target_vendor = "apple")]
            Self::Metal(backend) => backend.create_device(index).map(NativeDevice::Metal),
            Self::Host(backend) => backend.create_device(index).map(NativeDevice::Host),
        }
    }
}

/// A selected device.
#[derive(Debug, Clone)]
pub enum NativeDevice {
    #[cfg(feature = "cuda")]
    Cuda(CudaDevice),
    #[cfg(target_vendor = "apple")]
    Metal(MetalDevice),
    Host(HostDevice),
}

impl NativeDevice {
    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => BackendKind::Cuda,
            #[cfg(target_vendor = "apple")]
            Self::Metal(_) => BackendKind::Metal,
            Self::Host(_) => BackendKind::Host,
        }
    }

    pub fn info(&self) -> Result<DeviceInfo> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(device) => device.info(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(device) => Ok(device.info()),
            Self::Host(device) => Ok(device.info()),
        }
    }

    pub fn create_context(&self) -> NativeContext {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(device) => NativeContext::Cuda(device.create_context()),
            #[cfg(target_vendor = "apple")]
            Self::Metal(device) => NativeContext::Metal(device.create_context()),
            Self::Host(device) => NativeContext::Host(device.create_context()),
        }
    }
}

/// Allocation scope for one device.
#[derive(Debug, Clone)]
pub enum NativeContext {
    #[cfg(feature = "cuda")]
    Cuda(CudaContext),
    #[cfg(target_vendor = "apple")]
    Metal(MetalContext),
    Host(HostContext),
}

impl NativeContext {
    pub fn allocate(&self, size: u64) -> Result<NativeBuffer> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(context) => context.allocate(size).map(NativeBuffer::Cuda),
            #[cfg(target_vendor = "apple")]
            Self::Metal(context) => context.allocate(size).map(NativeBuffer::Metal),
            Self::Host(context) => context.allocate(size).map(NativeBuffer::Host),
        }
    }

    pub fn create_queue(&self) -> Result<NativeQueue> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(context) => context.create_queue().map(NativeQueue::Cuda),
            #[cfg(target_vendor = "apple")]
            Self::Metal(context) => context.create_queue().map(NativeQueue::Metal),
            Self::Host(context) => context.create_queue().map(NativeQueue::Host),
        }
    }

    pub fn load_module(&self, payload: &[u8]) -> Result<NativeModule> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(context) => context.load_module(payload).map(NativeModule::Cuda),
            #[cfg(target_vendor = "apple")]
            Self::Metal(context) => context.load_module(payload).map(NativeModule::Metal),
            Self::Host(context) => context.load_module(payload).map(NativeModule::Host),
        }
    }
}

/// Device memory handle. Cloning is cheap and refers to the same memory.
#[derive(Debug, Clone)]
pub enum NativeBuffer {
    #[cfg(feature = "cuda")]
    Cuda(CudaBuffer),
    #[cfg(target_vendor = "apple")]
    Metal(MetalBuffer),
    Host(HostBuffer),
}

impl NativeBuffer {
    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => BackendKind::Cuda,
            #[cfg(target_vendor = "apple")]
            Self::Metal(_) => BackendKind::Metal,
            Self::Host(_) => BackendKind::Host,
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(buffer) => buffer.len(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(buffer) => buffer.len(),
            Self::Host(buffer) => buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Device-to-host copy of the buffer prefix
    pub fn read_into(&self, out: &mut [u8]) -> Result<()> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(buffer) => buffer.read_into(out),
            #[cfg(target_vendor = "apple")]
            Self::Metal(buffer) => buffer.read_into(out),
            Self::Host(buffer) => buffer.read_into(out),
        }
    }

    /// Host-to-device copy into the buffer prefix
    pub fn write_from(&self, data: &[u8]) -> Result<()> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(buffer) => buffer.write_from(data),
            #[cfg(target_vendor = "apple")]
            Self::Metal(buffer) => buffer.write_from(data),
            Self::Host(buffer) => buffer.write_from(data),
        }
    }

    /// Device-to-device copy; both handles must come from the same backend
    pub fn copy_from(&self, src: &NativeBuffer, bytes: u64) -> Result<()> {
        match (self, src) {
            #[cfg(feature = "cuda")]
            (Self::Cuda(dst), Self::Cuda(src)) => dst.copy_from(src, bytes),
            #[cfg(target_vendor = "apple")]
            (Self::Metal(dst), Self::Metal(src)) => dst.copy_from(src, bytes),
            (Self::Host(dst), Self::Host(src)) => dst.copy_from(src, bytes),
            #[cfg(any(feature = "cuda", target_vendor = "apple"))]
            (dst, src) => Err(DriverError::BackendMismatch {
                op: "copy_device_to_device",
                expected: dst.kind().formal_name(),
                actual: src.kind().formal_name(),
            }),
        }
    }

    /// Release the memory behind this handle
    pub fn release(self) -> Result<()> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(buffer) => buffer.release(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(buffer) => buffer.release(),
            Self::Host(buffer) => buffer.release(),
        }
    }
}

/// In-order execution queue.
#[derive(Debug, Clone)]
pub enum NativeQueue {
    #[cfg(feature = "cuda")]
    Cuda(CudaQueue),
    #[cfg(target_vendor = "apple")]
    Metal(MetalQueue),
    Host(HostQueue),
}

impl NativeQueue {
    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => BackendKind::Cuda,
            #[cfg(target_vendor = "apple")]
            Self::Metal(_) => BackendKind::Metal,
            Self::Host(_) => BackendKind::Host,
        }
    }

    /// Enqueue a launch; the function must come from the same backend
    pub fn launch(&self, function: &NativeFunction, shape: &LaunchShape, args: &[KernelArg]) -> Result<()> {
        match (self, function) {
            #[cfg(feature = "cuda")]
            (Self::Cuda(queue), NativeFunction::Cuda(function)) => queue.launch(function, shape, args),
            #[cfg(target_vendor = "apple")]
            (Self::Metal(queue), NativeFunction::Metal(function)) => queue.launch(function, shape, args),
            (Self::Host(queue), NativeFunction::Host(function)) => queue.launch(function, shape, args),
            #[cfg(any(feature = "cuda", target_vendor = "apple"))]
            (queue, function) => Err(DriverError::BackendMismatch {
                op: "launch",
                expected: queue.kind().formal_name(),
                actual: function.kind().formal_name(),
            }),
        }
    }

    /// Block until everything enqueued so far has retired
    pub fn synchronize(&self) -> Result<()> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(queue) => queue.synchronize(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(queue) => queue.synchronize(),
            Self::Host(queue) => queue.synchronize(),
        }
    }

    /// Record a completion handle at the queue's current position
    pub fn record_event(&self) -> Result<NativeEvent> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(queue) => queue.record_event().map(NativeEvent::Cuda),
            #[cfg(target_vendor = "apple")]
            Self::Metal(queue) => queue.record_event().map(NativeEvent::Metal),
            Self::Host(queue) => queue.record_event().map(NativeEvent::Host),
        }
    }

    /// Release the queue behind this handle
    pub fn release(self) -> Result<()> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(queue) => queue.release(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(queue) => queue.release(),
            Self::Host(queue) => queue.release(),
        }
    }
}

/// A loaded kernel container.
#[derive(Debug)]
pub enum NativeModule {
    #[cfg(feature = "cuda")]
    Cuda(CudaModule),
    #[cfg(target_vendor = "apple")]
    Metal(MetalModule),
    Host(HostModule),
}

impl NativeModule {
    pub fn function(&self, name: &str) -> Result<NativeFunction> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(module) => module.function(name).map(NativeFunction::Cuda),
            #[cfg(target_vendor = "apple")]
            Self::Metal(module) => module.function(name).map(NativeFunction::Metal),
            Self::Host(module) => module.function(name).map(NativeFunction::Host),
        }
    }
}

/// A retrievable entry point.
#[derive(Debug, Clone)]
pub enum NativeFunction {
    #[cfg(feature = "cuda")]
    Cuda(CudaFunction),
    #[cfg(target_vendor = "apple")]
    Metal(MetalFunction),
    Host(HostFunction),
}

impl NativeFunction {
    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => BackendKind::Cuda,
            #[cfg(target_vendor = "apple")]
            Self::Metal(_) => BackendKind::Metal,
            Self::Host(_) => BackendKind::Host,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(function) => function.name(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(function) => function.name(),
            Self::Host(function) => function.name(),
        }
    }

    pub fn max_work_group_size(&self) -> u32 {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(function) => function.max_work_group_size(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(function) => function.max_work_group_size(),
            Self::Host(function) => function.max_work_group_size(),
        }
    }
}

/// Completion source recorded against a queue position.
#[derive(Debug)]
pub enum NativeEvent {
    #[cfg(feature = "cuda")]
    Cuda(CudaEvent),
    #[cfg(target_vendor = "apple")]
    Metal(MetalEvent),
    Host(HostEvent),
}

impl NativeEvent {
    /// Block until the recorded position has retired
    pub fn synchronize(&self) -> Result<()> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(event) => event.synchronize(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(event) => event.synchronize(),
            Self::Host(event) => event.synchronize(),
        }
    }

    /// Release the completion source; legal exactly once since it consumes
    pub fn release(self) -> Result<()> {
        match self {
            #[cfg(feature = "cuda")]
            Self::Cuda(event) => event.release(),
            #[cfg(target_vendor = "apple")]
            Self::Metal(event) => event.release(),
            Self::Host(event) => event.release(),
        }
    }
}

// ================================================================================================
// Tests
// ================================================================================================
