//! Types shared across the driver boundary

use std::fmt;

/// Identity of a native compute driver.
///
/// The set is closed: adding a backend means adding a variant here and an
/// arm to every exhaustive match over the native sum types, which the
/// compiler checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// NVIDIA driver, loaded through `cudarc`
    Cuda,
    /// Apple driver, loaded through the `metal` crate
    Metal,
    /// In-process reference driver, always available
    Host,
}

impl BackendKind {
    /// Selection priority: lower value wins during auto-selection.
    pub const fn priority(self) -> u8 {
        match self {
            Self::Cuda => 0,
            Self::Metal => 1,
            Self::Host => 2,
        }
    }

    /// Human-readable backend name
    pub const fn formal_name(self) -> &'static str {
        match self {
            Self::Cuda => "CUDA",
            Self::Metal => "Metal",
            Self::Host => "Host",
        }
    }

    /// Target identifier handed to the kernel-compilation collaborator.
    ///
    /// `None` means the backend only accepts payloads it defines itself.
    pub const fn compile_target(self) -> Option<&'static str> {
        match self {
            Self::Cuda => Some("ptx"),
            Self::Metal => Some("metal"),
            Self::Host => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.formal_name())
    }
}

/// Optional features a device may support.
///
/// Queried before selecting data types or kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFeature {
    /// Half-precision (FP16) arithmetic
    Fp16,
    /// Double-precision (FP64) arithmetic
    Fp64,
}

/// Metadata reported by a native device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Human-readable device name
    pub name: String,
    /// Vendor name
    pub vendor: String,
    /// Total device memory in bytes
    pub memory_size: u64,
    /// Features the device supports
    pub features: Vec<DeviceFeature>,
}

impl DeviceInfo {
    /// Check whether the device reports a feature
    pub fn supports(&self, feature: DeviceFeature) -> bool {
        self.features.contains(&feature)
    }
}

/// Grid and block extents for a kernel launch, already derived by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchShape {
    /// Number of blocks per axis
    pub grid: [u32; 3],
    /// Invocations per block per axis
    pub block: [u32; 3],
    /// Shared memory per block in bytes
    pub shared_mem_bytes: u32,
}

impl LaunchShape {
    /// Total invocations along the x axis
    pub const fn linear_invocations(&self) -> u64 {
        self.grid[0] as u64 * self.block[0] as u64
    }

    /// Total invocations across all axes
    pub const fn total_invocations(&self) -> u64 {
        let blocks = self.grid[0] as u64 * self.grid[1] as u64 * self.grid[2] as u64;
        let lanes = self.block[0] as u64 * self.block[1] as u64 * self.block[2] as u64;
        blocks * lanes
    }
}

impl fmt::Display for LaunchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grid=({}, {}, {}), block=({}, {}, {}), shared_mem={}B",
            self.grid[0], self.grid[1], self.grid[2], self.block[0], self.block[1], self.block[2], self.shared_mem_bytes
        )
    }
}

/// A scalar kernel argument.
///
/// The variant is fixed at argument-list construction time so every
/// marshalling site can match exhaustively instead of type-testing at
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    /// Size of the native slot this scalar occupies
    pub const fn size_bytes(&self) -> usize {
        match self {
            Self::I8(_) => 1,
            Self::I16(_) => 2,
            Self::I32(_) => 4,
            Self::I64(_) => 8,
            Self::F32(_) => 4,
            Self::F64(_) => 8,
        }
    }

    /// Native-endian byte image of the scalar
    pub fn ne_bytes(&self) -> Vec<u8> {
        match self {
            Self::I8(v) => v.to_ne_bytes().to_vec(),
            Self::I16(v) => v.to_ne_bytes().to_vec(),
            Self::I32(v) => v.to_ne_bytes().to_vec(),
            Self::I64(v) => v.to_ne_bytes().to_vec(),
            Self::F32(v) => v.to_ne_bytes().to_vec(),
            Self::F64(v) => v.to_ne_bytes().to_vec(),
        }
    }
}

// ================================================================================================
// Tests
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_priorities_prefer_gpu() {
        assert!(BackendKind::Cuda.priority() < BackendKind::Metal.priority());
        assert!(BackendKind::Metal.priority() < BackendKind::Host.priority());
    }

    #[test]
    fn compile_targets() {
        assert_eq!(BackendKind::Cuda.compile_target(), Some("ptx"));
        assert_eq!(BackendKind::Metal.compile_target(), Some("metal"));
        assert_eq!(BackendKind::Host.compile_target(), None);
    }

    #[test]
    fn launch_shape_invocations() {
        let shape = LaunchShape {
            grid: [4, 2, 1],
            block: [64, 1, 1],
            shared_mem_bytes: 0,
        };
        assert_eq!(shape.linear_invocations(), 256);
        assert_eq!(shape.total_invocations(), 512);
    }

    #[test]
    fn scalar_byte_images() {
        assert_eq!(Scalar::I8(-1).ne_bytes(), vec![0xFF]);
        assert_eq!(Scalar::I32(7).size_bytes(), 4);
        assert_eq!(Scalar::F64(0.0).ne_bytes().len(), 8);
        assert_eq!(Scalar::F32(1.5).ne_bytes(), 1.5f32.to_ne_bytes().to_vec());
    }

    #[test]
    fn device_info_feature_query() {
        let info = DeviceInfo {
            name: "test".into(),
            vendor: "test".into(),
            memory_size: 0,
            features: vec![DeviceFeature::Fp16],
        };
        assert!(info.supports(DeviceFeature::Fp16));
        assert!(!info.supports(DeviceFeature::Fp64));
    }
}
