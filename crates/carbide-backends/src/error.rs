//! Error types for native driver operations

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors reported by the native driver layer.
///
/// Every variant carries enough context (operation name, native status code,
/// handle kind) to diagnose a failure without inspecting driver internals.
/// The type is `Clone` so a single asynchronous completion result can be
/// observed by any number of waiters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    /// Native allocation returned a null handle or an out-of-memory status
    #[error("out of device memory: requested {requested} bytes")]
    OutOfMemory { requested: u64 },

    /// A native call returned a non-success status
    #[error("{op} failed: native status {code}")]
    Operation { op: &'static str, code: i64 },

    /// A handle did not resolve to a live driver object
    #[error("invalid {kind} handle: {id}")]
    InvalidHandle { kind: &'static str, id: u64 },

    /// A host transfer did not fit the allocation it targeted
    #[error("transfer of {requested} bytes exceeds allocation of {capacity} bytes")]
    TransferOutOfBounds { requested: u64, capacity: u64 },

    /// A resource from one backend was handed to another
    #[error("{op}: expected a {expected} resource, got {actual}")]
    BackendMismatch {
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    /// Module payload could not be loaded
    #[error("module load failed: {reason}")]
    ModuleLoad { reason: String },

    /// Function lookup failed inside a loaded module
    #[error("function '{name}' not found in module")]
    FunctionNotFound { name: String },

    /// A kernel rejected the argument list it was launched with
    #[error("kernel '{kernel}' rejected its arguments: {reason}")]
    InvalidArguments { kernel: String, reason: String },

    /// Capability not implemented by this backend
    #[error("{backend} backend does not support {what}")]
    Unsupported { backend: &'static str, what: String },
}

impl DriverError {
    /// Create an operation-failure error from a native status code
    pub fn operation(op: &'static str, code: impl Into<i64>) -> Self {
        Self::Operation { op, code: code.into() }
    }

    /// Create an unsupported-capability error
    pub fn unsupported(backend: &'static str, what: impl Into<String>) -> Self {
        Self::Unsupported {
            backend,
            what: what.into(),
        }
    }

    /// Create a module-load error
    pub fn module_load(reason: impl Into<String>) -> Self {
        Self::ModuleLoad { reason: reason.into() }
    }
}
