//! Error types for the compute core

use crate::memory::MemoryState;
use carbide_backends::DriverError;

/// Result type for compute core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the compute core.
///
/// The taxonomy separates precondition/state violations, argument and size
/// validation, resource exhaustion, and native operation failures, so a
/// caller can tell a misused handle from a driver fault without string
/// matching. Nothing here is retried internally; every failure propagates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted on a resource that is no longer alive
    #[error("{kind} is not alive (state: {state})")]
    DeadResource { kind: &'static str, state: MemoryState },

    /// A peer resource bound into an operation is no longer alive
    #[error("peer {kind} is not alive (state: {state})")]
    DeadPeer { kind: &'static str, state: MemoryState },

    /// A compute size component was not a positive integer in range
    #[error("invalid compute size {axis} component: {value}")]
    InvalidExtent { axis: char, value: i64 },

    /// Group size with zero total invocations
    #[error("group size has zero total invocations")]
    EmptyGroup,

    /// A buffer argument was dead when added or when dispatched
    #[error("buffer argument at position {position} is not alive")]
    DeadArgument { position: usize },

    /// Host transfer or device copy larger than the target buffer
    #[error("{op} of {requested} bytes exceeds buffer capacity of {capacity} bytes")]
    OutOfRange {
        op: &'static str,
        requested: u64,
        capacity: u64,
    },

    /// Native allocation could not be satisfied
    #[error("out of device memory: requested {requested} bytes")]
    OutOfMemory { requested: u64 },

    /// Module payload could not be read from disk
    #[error("failed to read module from {path}: {source}")]
    ModuleRead {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// A requested backend is not present or reports no devices
    #[error("backend '{requested}' is not available on this system")]
    BackendUnavailable { requested: &'static str },

    /// No compiled-in backend reports availability
    #[error("no compute backend available on this system")]
    NoBackend,

    /// Failure reported by the native driver layer
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// One or more releases failed during arena or pool teardown.
    ///
    /// Teardown keeps releasing the remaining resources past a failure so a
    /// single stuck handle does not leak the rest; the failures are
    /// collected here.
    #[error("resource teardown completed with {} failure(s)", .failures.len())]
    Teardown { failures: Vec<Error> },
}

impl Error {
    /// Map a native allocation failure, keeping out-of-memory distinct from
    /// generic driver faults.
    pub(crate) fn from_allocation(error: DriverError) -> Self {
        match error {
            DriverError::OutOfMemory { requested } => Self::OutOfMemory { requested },
            other => Self::Driver(other),
        }
    }
}
