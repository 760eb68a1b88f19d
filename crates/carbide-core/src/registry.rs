//! Backend selection registry
//!
//! An explicitly constructed registry object, held by the application's
//! composition root, replaces any process-wide "active backend" state.
//! Auto-selection is lazy and happens at most once per registry, guarded by
//! a `OnceLock`: the compiled-in candidates are filtered to those reporting
//! availability and the lowest priority value wins. Explicitly requesting a
//! backend that is absent fails fast instead of silently falling back.

use std::sync::OnceLock;

use carbide_backends::{BackendKind, NativeBackend};

use crate::device::ComputeDevice;
use crate::error::{Error, Result};

/// A selected backend, ready to enumerate and create devices.
#[derive(Debug)]
pub struct ComputeBackend {
    native: NativeBackend,
}

impl ComputeBackend {
    /// Backend identity
    pub fn kind(&self) -> BackendKind {
        self.native.kind()
    }

    /// Human-readable backend name
    pub fn name(&self) -> &'static str {
        self.kind().formal_name()
    }

    /// Number of devices this backend exposes
    pub fn device_count(&self) -> usize {
        self.native.device_count()
    }

    /// Create a device by index.
    pub fn create_device(&self, index: usize) -> Result<ComputeDevice> {
        let native = self.native.create_device(index)?;
        ComputeDevice::from_native(self.kind(), native)
    }

    /// Create the first device (index 0).
    pub fn create_default_device(&self) -> Result<ComputeDevice> {
        self.create_device(0)
    }
}

/// Registry over the compiled-in backends.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    selected: OnceLock<ComputeBackend>,
}

impl BackendRegistry {
    /// Create a registry that auto-selects lazily on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pinned to one backend, probing it now.
    ///
    /// Fails fast if the backend is not compiled in or reports itself
    /// unavailable on this system.
    pub fn with_backend(kind: BackendKind) -> Result<Self> {
        let native = NativeBackend::candidates()
            .into_iter()
            .find(|candidate| candidate.kind() == kind)
            .filter(|candidate| candidate.is_available())
            .ok_or(Error::BackendUnavailable {
                requested: kind.formal_name(),
            })?;

        let registry = Self::new();
        let _ = registry.selected.set(ComputeBackend { native });
        Ok(registry)
    }

    /// The active backend, auto-selecting the best available on first call.
    pub fn backend(&self) -> Result<&ComputeBackend> {
        if let Some(backend) = self.selected.get() {
            return Ok(backend);
        }

        let native = Self::select_best()?;
        tracing::info!(backend = %native.kind(), "backend_selected");
        // A racing caller may have initialized first; its selection wins.
        Ok(self.selected.get_or_init(|| ComputeBackend { native }))
    }

    fn select_best() -> Result<NativeBackend> {
        NativeBackend::candidates()
            .into_iter()
            .filter(NativeBackend::is_available)
            .min_by_key(|candidate| candidate.kind().priority())
            .ok_or(Error::NoBackend)
    }

    /// Create the first device of the active backend.
    pub fn create_device(&self) -> Result<ComputeDevice> {
        self.backend()?.create_default_device()
    }

    /// Create a device of the active backend by index.
    pub fn create_device_at(&self, index: usize) -> Result<ComputeDevice> {
        self.backend()?.create_device(index)
    }
}

// ================================================================================================
// Tests
// ================================================================================================
