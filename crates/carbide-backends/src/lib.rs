//! Native compute driver implementations behind the carbide compute core
//!
//! This crate is the collaborator boundary of the compute core: allocation,
//! host transfers, queue creation, kernel launch, synchronization, module
//! loading, and device metadata, satisfied by whichever drivers are compiled
//! into the build.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              carbide-core (lifecycle, dispatch)          │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ closed sum types (driver.rs)
//!         ┌─────────────┼─────────────┐
//!         ▼             ▼             ▼
//!   ┌─────────┐  ┌─────────┐  ┌─────────┐
//!   │  CUDA   │  │  Metal  │  │  Host   │
//!   │ cudarc  │  │  metal  │  │ builtin │
//!   └─────────┘  └─────────┘  └─────────┘
//! ```
//!
//! The CUDA driver is behind the `cuda` cargo feature; the Metal driver is
//! compiled on Apple targets. The host reference driver is always present,
//! so the full dispatch protocol can be exercised on any machine.

pub mod driver;
pub mod error;
pub mod host;
pub mod types;

#[cfg(feature = "cuda")]
pub mod cuda;

#[cfg(target_vendor = "apple")]
pub mod metal;

// Re-export public API
pub use driver::{
    KernelArg, NativeBackend, NativeBuffer, NativeContext, NativeDevice, NativeEvent, NativeFunction, NativeModule,
    NativeQueue,
};
pub use error::{DriverError, Result};
pub use types::{BackendKind, DeviceFeature, DeviceInfo, LaunchShape, Scalar};
