//! Asynchronous dispatch completion
//!
//! A `ComputeEvent` starts pending the instant `dispatch_async` returns and
//! resolves exactly once, to success or to the captured driver failure. One
//! background waiter per event performs the blocking native wait, resolves
//! the completion cell, and releases the native completion source exactly
//! once (it owns the source by value, so there is no second release path).
//! Any number of observers may wait on or attach callbacks to the same
//! event; all of them see the single resolution.
//!
//! There is no cancellation or timeout anywhere in this path; a caller can
//! only wait. This mirrors the in-order semantics of the underlying drivers
//! and is a documented limitation, not an oversight.

use std::sync::Arc;

use carbide_backends::{DriverError, NativeEvent};
use parking_lot::{Condvar, Mutex};

use crate::error::Result;

/// Resolution value delivered to every observer of an event.
pub type CompletionResult = std::result::Result<(), DriverError>;

type Callback = Box<dyn FnOnce(&CompletionResult) + Send>;

enum CellState {
    Pending(Vec<Callback>),
    Done(CompletionResult),
}

/// Single-resolution completion cell: one resolver, many observers.
struct CompletionCell {
    state: Mutex<CellState>,
    done: Condvar,
}

impl CompletionCell {
    fn new() -> Self {
        Self {
            state: Mutex::new(CellState::Pending(Vec::new())),
            done: Condvar::new(),
        }
    }

    /// Resolve the cell. The first resolution wins; later calls are no-ops.
    fn resolve(&self, result: CompletionResult) {
        let callbacks = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, CellState::Done(result.clone())) {
                CellState::Pending(callbacks) => callbacks,
                CellState::Done(previous) => {
                    // already resolved; keep the first result
                    *state = CellState::Done(previous);
                    return;
                }
            }
        };

        for callback in callbacks {
            callback(&result);
        }
        self.done.notify_all();
    }

    fn wait(&self) -> CompletionResult {
        let mut state = self.state.lock();
        loop {
            match &*state {
                CellState::Done(result) => return result.clone(),
                CellState::Pending(_) => self.done.wait(&mut state),
            }
        }
    }

    fn peek(&self) -> Option<CompletionResult> {
        match &*self.state.lock() {
            CellState::Done(result) => Some(result.clone()),
            CellState::Pending(_) => None,
        }
    }

    /// Store a callback, or hand it back with the result if already resolved.
    fn push_callback(&self, callback: Callback) -> Option<(Callback, CompletionResult)> {
        let mut state = self.state.lock();
        match &mut *state {
            CellState::Pending(callbacks) => {
                callbacks.push(callback);
                None
            }
            CellState::Done(result) => Some((callback, result.clone())),
        }
    }
}

/// Asynchronous completion handle returned by `dispatch_async`.
///
/// Clones observe the same underlying completion.
#[derive(Clone)]
pub struct ComputeEvent {
    cell: Arc<CompletionCell>,
}

impl ComputeEvent {
    /// Wrap a recorded native event and spawn its waiter.
    pub(crate) fn spawn(native: NativeEvent) -> Self {
        let cell = Arc::new(CompletionCell::new());
        let waiter_cell = Arc::clone(&cell);

        let spawned = std::thread::Builder::new()
            .name("carbide-event-waiter".to_string())
            .spawn(move || {
                let result = native.synchronize();
                waiter_cell.resolve(result);
                if let Err(error) = native.release() {
                    tracing::warn!(%error, "event completion source release failed");
                }
            });

        if let Err(error) = spawned {
            // The waiter never started, so nothing will resolve the cell.
            cell.resolve(Err(DriverError::Operation {
                op: "event waiter spawn",
                code: error.raw_os_error().unwrap_or(-1) as i64,
            }));
        }

        Self { cell }
    }

    /// True once the event has resolved, successfully or not
    pub fn is_completed(&self) -> bool {
        self.cell.peek().is_some()
    }

    /// True once the event has resolved to a failure
    pub fn is_failed(&self) -> bool {
        matches!(self.cell.peek(), Some(Err(_)))
    }

    /// Block until the event resolves and return the outcome.
    ///
    /// Waiting is idempotent: every caller sees the same resolution.
    pub fn wait(&self) -> Result<()> {
        self.cell.wait()?;
        Ok(())
    }

    /// Attach a completion callback.
    ///
    /// Runs on the waiter thread after resolution, or immediately on the
    /// calling thread if the event has already resolved.
    pub fn on_completion<F>(&self, callback: F)
    where
        F: FnOnce(&CompletionResult) + Send + 'static,
    {
        if let Some((callback, result)) = self.cell.push_callback(Box::new(callback)) {
            callback(&result);
        }
    }
}

impl std::fmt::Debug for ComputeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeEvent")
            .field("completed", &self.is_completed())
            .field("failed", &self.is_failed())
            .finish()
    }
}

// ================================================================================================
// Tests
// ================================================================================================
