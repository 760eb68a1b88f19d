//! Lifecycle state machine for native-backed resources
//!
//! Every resource that wraps a native handle is either ALIVE or FREE, and
//! the transition is one-way. `free()` is idempotent; every other operation
//! asserts ALIVE first. Internally the transition is a sentinel swap: the
//! native handle is physically consumed out of its [`Slot`] on free, so a
//! freed resource cannot reach the driver again.

use std::fmt;

use crate::error::{Error, Result};

/// Lifecycle state for [`Freeable`] resources.
///
/// `Alive` indicates valid usage, `Free` indicates released. There is no
/// path from `Free` back to `Alive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryState {
    Alive,
    Free,
}

impl fmt::Display for MemoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alive => f.write_str("ALIVE"),
            Self::Free => f.write_str("FREE"),
        }
    }
}

/// A resource with an explicit lifetime managed through the driver layer.
///
/// Typical implementors are buffers and queues. The sole legal destruction
/// path is [`Freeable::free`]; nothing is released implicitly on drop.
pub trait Freeable {
    /// Resource kind used in diagnostics (e.g. `"ComputeBuffer"`)
    fn resource_kind(&self) -> &'static str;

    /// Current lifecycle state
    fn state(&self) -> MemoryState;

    /// Release the underlying native resource.
    ///
    /// Calling `free` on an already-freed resource is a no-op, not an error.
    fn free(&self) -> Result<()>;

    /// True while the resource has not been freed
    fn is_alive(&self) -> bool {
        self.state() == MemoryState::Alive
    }

    /// Fail with a state error unless the resource is alive
    fn ensure_alive(&self) -> Result<()> {
        match self.state() {
            MemoryState::Alive => Ok(()),
            state => Err(Error::DeadResource {
                kind: self.resource_kind(),
                state,
            }),
        }
    }

    /// Fail with a state error unless a peer resource is alive.
    ///
    /// Used before binding two resources together (e.g. a buffer-to-buffer
    /// copy), so a freed object cannot be used as a copy source or
    /// destination.
    fn ensure_other(&self, other: &dyn Freeable) -> Result<()> {
        match other.state() {
            MemoryState::Alive => Ok(()),
            state => Err(Error::DeadPeer {
                kind: other.resource_kind(),
                state,
            }),
        }
    }
}

/// Holds a native handle until the owning resource is freed.
///
/// `take` swaps in the `Freed` sentinel and hands the native handle out by
/// value exactly once; afterwards every accessor reports the dead state.
#[derive(Debug)]
pub(crate) enum Slot<T> {
    Alive(T),
    Freed,
}

impl<T> Slot<T> {
    pub(crate) fn state(&self) -> MemoryState {
        match self {
            Self::Alive(_) => MemoryState::Alive,
            Self::Freed => MemoryState::Free,
        }
    }

    /// Consume the native handle, transitioning to `Freed`.
    /// Returns `None` if the slot was already freed.
    pub(crate) fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, Self::Freed) {
            Self::Alive(value) => Some(value),
            Self::Freed => None,
        }
    }
}

impl<T: Clone> Slot<T> {
    /// Clone the native handle out, or fail with the dead-resource error.
    pub(crate) fn cloned(&self, kind: &'static str) -> Result<T> {
        match self {
            Self::Alive(value) => Ok(value.clone()),
            Self::Freed => Err(Error::DeadResource {
                kind,
                state: MemoryState::Free,
            }),
        }
    }
}

// ================================================================================================
// Tests
// ================================================================================================
