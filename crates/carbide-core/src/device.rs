//! Compute devices and their capability metadata

use carbide_backends::{BackendKind, DeviceFeature, DeviceInfo, NativeDevice};

use crate::context::ComputeContext;
use crate::error::Result;

/// A compute device exposed by a backend.
///
/// Provides metadata and feature queries for capability checks, and creates
/// the [`ComputeContext`] used for allocation and dispatch.
#[derive(Debug)]
pub struct ComputeDevice {
    kind: BackendKind,
    native: NativeDevice,
    info: DeviceInfo,
}

impl ComputeDevice {
    pub(crate) fn from_native(kind: BackendKind, native: NativeDevice) -> Result<Self> {
        let info = native.info()?;
        Ok(Self { kind, native, info })
    }

    /// Backend this device belongs to
    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// Human-readable device name
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Vendor name
    pub fn vendor(&self) -> &str {
        &self.info.vendor
    }

    /// Total device memory in bytes
    pub fn memory_size(&self) -> u64 {
        self.info.memory_size
    }

    /// Check whether the device supports a feature
    pub fn supports(&self, feature: DeviceFeature) -> bool {
        self.info.supports(feature)
    }

    /// Create a new context bound to this device.
    pub fn create_context(&self) -> ComputeContext {
        ComputeContext::from_native(self.kind, self.native.create_context())
    }
}
