//! Backend-agnostic GPU compute core
//!
//! A single API surface — device → context → queue/buffer/module/function —
//! satisfied by whichever native drivers are compiled into the build, with
//! uniform lifetime and dispatch semantics on top of drivers whose
//! primitives differ in capability and error style:
//!
//! - **Lifecycle**: every native-backed resource is ALIVE until explicitly
//!   freed, `free()` is idempotent, and a freed resource can never reach the
//!   driver again ([`memory`]).
//! - **Scoped ownership**: arenas release registered resources in reverse
//!   registration order on scope exit ([`arena`]).
//! - **Reuse**: keyed pools retire buffers for later acquisitions of the
//!   same shape without reallocation ([`pool`]).
//! - **Dispatch**: validated sizes and tagged argument lists are marshalled
//!   into the native launch convention, synchronously or with an observable
//!   completion event ([`queue`], [`event`]).
//!
//! # Usage
//!
//! ```
//! use carbide_core::{BackendRegistry, ComputeArgs, ComputeSize};
//!
//! # fn main() -> carbide_core::Result<()> {
//! let registry = BackendRegistry::new();
//! let device = registry.create_device()?;
//! let context = device.create_context();
//!
//! let mut arena = context.create_arena();
//! let queue = arena.create_queue()?;
//! let input = arena.allocate_slice(&[1.0f32, 2.0, 3.0, 4.0])?;
//! let output = arena.allocate_bytes(16)?;
//!
//! let module = context.load_module_source("copy")?;
//! let kernel = module.get_function("copy")?;
//!
//! let args = ComputeArgs::new().buffer(&input)?.buffer(&output)?;
//! queue.dispatch(&kernel, ComputeSize::linear(4)?, ComputeSize::linear(4)?, &args)?;
//!
//! let mut result = [0.0f32; 4];
//! output.get(&mut result)?;
//! assert_eq!(result, [1.0, 2.0, 3.0, 4.0]);
//!
//! arena.close()?;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod arena;
pub mod buffer;
pub mod context;
pub mod device;
pub mod error;
pub mod event;
pub mod half;
pub mod memory;
pub mod module;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod size;

// Re-export public API
pub use args::{ArgValue, ComputeArgs};
pub use arena::ComputeArena;
pub use buffer::ComputeBuffer;
pub use context::ComputeContext;
pub use device::ComputeDevice;
pub use error::{Error, Result};
pub use event::{CompletionResult, ComputeEvent};
pub use memory::{Freeable, MemoryState};
pub use module::{ComputeFunction, ComputeModule};
pub use pool::{MemoryPool, Pooled};
pub use queue::ComputeQueue;
pub use registry::{BackendRegistry, ComputeBackend};
pub use size::ComputeSize;

// The driver-boundary vocabulary callers see in signatures
pub use carbide_backends::{BackendKind, DeviceFeature, DriverError, Scalar};
