//! Pause/resume protocol between the producer and the render thread.
//!
//! The producer pauses, mutates, then resumes. The render thread checks the
//! gate at the top of every iteration and parks while it is paused. Both
//! sides wait with timeouts.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("Render thread did not reach the gate within {0:?}")]
    Timeout(Duration),
}

/// Lifecycle of the render thread as seen through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderThreadState {
    Uninitialized,
    Running,
    WaitingForGate,
    Drawing,
    Terminated,
}

impl RenderThreadState {
    fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Drawing)
    }
}

/// Result of [`Gate::park`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateWait {
    /// Not paused; run a frame.
    Open,
    /// Still paused after the timeout; check for close and park again.
    StillPaused,
    /// The gate was closed; stop the loop.
    Closed,
}

#[derive(Debug)]
struct GateState {
    paused: bool,
    closed: bool,
    thread: RenderThreadState,
}

#[derive(Debug)]
pub struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                paused: false,
                closed: false,
                thread: RenderThreadState::Uninitialized,
            }),
            changed: Condvar::new(),
        }
    }

    /// Set the paused flag and wake all waiters.
    pub fn request_pause(&self) {
        self.state.lock().paused = true;
        self.changed.notify_all();
    }

    /// Clear the paused flag and wake all waiters.
    pub fn request_resume(&self) {
        self.state.lock().paused = false;
        self.changed.notify_all();
    }

    /// Pause and wait until the render thread is parked or not running.
    ///
    /// On timeout the pause is withdrawn. The returned guard resumes on drop.
    pub fn pause(&self, timeout: Duration) -> Result<PauseGuard<'_>, GateError> {
        let mut state = self.state.lock();
        state.paused = true;
        self.changed.notify_all();

        let waited = self.changed.wait_while_for(
            &mut state,
            |state| state.paused && state.thread.is_active(),
            timeout,
        );
        if waited.timed_out() && state.thread.is_active() {
            state.paused = false;
            drop(state);
            self.changed.notify_all();
            tracing::warn!("Pause timed out after {timeout:?}");
            return Err(GateError::Timeout(timeout));
        }
        Ok(PauseGuard { gate: self })
    }

    /// Render side: park while paused, for at most `timeout`.
    pub fn park(&self, timeout: Duration) -> GateWait {
        let mut state = self.state.lock();
        if state.closed {
            return GateWait::Closed;
        }
        if !state.paused {
            return GateWait::Open;
        }

        if state.thread != RenderThreadState::WaitingForGate {
            state.thread = RenderThreadState::WaitingForGate;
            self.changed.notify_all();
        }
        self.changed
            .wait_while_for(&mut state, |state| state.paused && !state.closed, timeout);

        if state.closed {
            GateWait::Closed
        } else if state.paused {
            GateWait::StillPaused
        } else {
            state.thread = RenderThreadState::Running;
            GateWait::Open
        }
    }

    /// Render side: record a lifecycle transition.
    pub fn set_thread_state(&self, thread: RenderThreadState) {
        self.state.lock().thread = thread;
        self.changed.notify_all();
    }

    pub fn thread_state(&self) -> RenderThreadState {
        self.state.lock().thread
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Ask the render thread to stop at its next gate check.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Holds the gate paused; resumes on drop.
#[must_use = "the gate resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PauseGuard<'a> {
    gate: &'a Gate,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.gate.request_resume();
    }
}
