//! Host reference driver
//!
//! An in-process driver that satisfies the same boundary as the GPU drivers:
//! allocation, host transfers, queues, modules, launches, and completion.
//! It exists so the whole dispatch protocol can be exercised end-to-end on
//! any machine; the GPU drivers play the same role against real hardware.
//!
//! Launches execute synchronously on the calling thread (rayon-parallel
//! inside the kernels where it pays), so queue synchronization and events
//! are trivially satisfied: by the time a launch call returns, the work has
//! retired. In-order queue semantics follow directly.

mod kernels;
mod memory;

use std::sync::Arc;

use crate::driver::{KernelArg, NativeBuffer};
use crate::error::{DriverError, Result};
use crate::types::{DeviceFeature, DeviceInfo, LaunchShape};

use kernels::{BuiltinKernel, ResolvedArg};
use memory::{HostAllocation, HostMemory};

/// Factory for the single host device.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostBackend;

impl HostBackend {
    pub fn new() -> Self {
        Self
    }

    /// The host driver is compiled into every build and needs no probing.
    pub fn is_available(&self) -> bool {
        true
    }

    pub fn device_count(&self) -> usize {
        1
    }

    pub fn create_device(&self, index: usize) -> Result<HostDevice> {
        if index != 0 {
            return Err(DriverError::InvalidHandle {
                kind: "device",
                id: index as u64,
            });
        }
        Ok(HostDevice)
    }
}

/// The in-process device.
#[derive(Debug, Clone, Copy)]
pub struct HostDevice;

impl HostDevice {
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Host Reference Device".to_string(),
            vendor: "carbide".to_string(),
            // The process heap is the device memory; the address space is
            // the only hard bound the driver can state.
            memory_size: usize::MAX as u64,
            features: vec![DeviceFeature::Fp16, DeviceFeature::Fp64],
        }
    }

    pub fn create_context(&self) -> HostContext {
        HostContext {
            memory: Arc::new(HostMemory::new()),
        }
    }
}

/// Allocation scope for host buffers, queues, and modules.
#[derive(Debug, Clone)]
pub struct HostContext {
    memory: Arc<HostMemory>,
}

impl HostContext {
    pub fn allocate(&self, size: u64) -> Result<HostBuffer> {
        let id = self.memory.allocate(size)?;
        Ok(HostBuffer {
            id,
            len: size,
            memory: Arc::clone(&self.memory),
        })
    }

    pub fn create_queue(&self) -> Result<HostQueue> {
        Ok(HostQueue)
    }

    /// Load a module from its payload.
    ///
    /// Host "modules" are manifests: one kernel name per non-comment line,
    /// resolved against the built-in kernel table. An empty manifest exports
    /// the whole table.
    pub fn load_module(&self, payload: &[u8]) -> Result<HostModule> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| DriverError::module_load("host module manifest is not UTF-8"))?;

        let mut exported = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if kernels::builtin(line).is_none() {
                return Err(DriverError::module_load(format!("unknown kernel '{line}'")));
            }
            exported.push(line.to_string());
        }

        Ok(HostModule { exported })
    }
}

/// Device memory handle backed by the context's allocation table.
#[derive(Debug, Clone)]
pub struct HostBuffer {
    id: u64,
    len: u64,
    memory: Arc<HostMemory>,
}

impl HostBuffer {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn allocation(&self) -> Result<HostAllocation> {
        self.memory.get(self.id)
    }

    /// Copy the buffer prefix into `out` (device-to-host)
    pub fn read_into(&self, out: &mut [u8]) -> Result<()> {
        let allocation = self.allocation()?;
        let storage = allocation.lock();

        if out.len() > storage.len() {
            return Err(DriverError::TransferOutOfBounds {
                requested: out.len() as u64,
                capacity: storage.len() as u64,
            });
        }

        out.copy_from_slice(&storage[..out.len()]);
        Ok(())
    }

    /// Copy `data` into the buffer prefix (host-to-device)
    pub fn write_from(&self, data: &[u8]) -> Result<()> {
        let allocation = self.allocation()?;
        let mut storage = allocation.lock();

        if data.len() > storage.len() {
            return Err(DriverError::TransferOutOfBounds {
                requested: data.len() as u64,
                capacity: storage.len() as u64,
            });
        }

        storage[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy `bytes` from `src` into this buffer (device-to-device)
    pub fn copy_from(&self, src: &HostBuffer, bytes: u64) -> Result<()> {
        let bytes = bytes as usize;

        let snapshot = {
            let src_allocation = src.allocation()?;
            let storage = src_allocation.lock();
            if bytes > storage.len() {
                return Err(DriverError::TransferOutOfBounds {
                    requested: bytes as u64,
                    capacity: storage.len() as u64,
                });
            }
            storage[..bytes].to_vec()
        };

        self.write_from(&snapshot)
    }

    /// Release the allocation behind this handle
    pub fn release(self) -> Result<()> {
        self.memory.free(self.id)
    }
}

/// Execution queue. Launches retire before the call returns.
#[derive(Debug, Clone, Copy)]
pub struct HostQueue;

impl HostQueue {
    pub fn launch(&self, function: &HostFunction, shape: &LaunchShape, args: &[KernelArg]) -> Result<()> {
        let resolved = resolve_args(args)?;
        tracing::trace!(kernel = function.name(), %shape, args = args.len(), "host_launch");
        function.kernel.execute(shape, &resolved)
    }

    /// Nothing can be pending once `launch` has returned.
    pub fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    /// Record the queue's current position; already retired on this driver.
    pub fn record_event(&self) -> Result<HostEvent> {
        Ok(HostEvent)
    }

    pub fn release(self) -> Result<()> {
        Ok(())
    }
}

fn resolve_args(args: &[KernelArg]) -> Result<Vec<ResolvedArg>> {
    args.iter()
        .map(|arg| match arg {
            KernelArg::Buffer(NativeBuffer::Host(buffer)) => Ok(ResolvedArg::Buffer(buffer.allocation()?)),
            #[cfg(any(feature = "cuda", target_vendor = "apple"))]
            KernelArg::Buffer(other) => Err(DriverError::BackendMismatch {
                op: "launch",
                expected: "Host",
                actual: other.kind().formal_name(),
            }),
            KernelArg::Scalar(scalar) => Ok(ResolvedArg::Scalar(*scalar)),
            KernelArg::Text(text) => Ok(ResolvedArg::Text(text.clone())),
        })
        .collect()
}

/// Loaded module: a name table over the built-in kernel set.
#[derive(Debug, Clone)]
pub struct HostModule {
    /// Names exported by the manifest; empty means the whole table.
    exported: Vec<String>,
}

impl HostModule {
    pub fn function(&self, name: &str) -> Result<HostFunction> {
        let visible = self.exported.is_empty() || self.exported.iter().any(|n| n == name);
        let kernel = if visible { kernels::builtin(name) } else { None };

        kernel
            .map(|kernel| HostFunction { kernel })
            .ok_or_else(|| DriverError::FunctionNotFound { name: name.to_string() })
    }

    /// Names resolvable through this module
    pub fn function_names(&self) -> Vec<&str> {
        if self.exported.is_empty() {
            kernels::builtin_names().collect()
        } else {
            self.exported.iter().map(String::as_str).collect()
        }
    }
}

/// Entry point retrieved from a [`HostModule`].
#[derive(Clone, Copy)]
pub struct HostFunction {
    kernel: BuiltinKernel,
}

impl HostFunction {
    pub fn name(&self) -> &'static str {
        self.kernel.name
    }

    pub fn max_work_group_size(&self) -> u32 {
        1024
    }
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunction").field("name", &self.kernel.name).finish()
    }
}

/// Completion marker. Work retired when the launch call returned.
#[derive(Debug, Clone, Copy)]
pub struct HostEvent;

impl HostEvent {
    pub fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    pub fn release(self) -> Result<()> {
        Ok(())
    }
}

// ================================================================================================
// Tests
// ================================================================================================
