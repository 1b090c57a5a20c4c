use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use winit::window::Window;

use crate::WindowProvider;

#[derive(Debug)]
struct Inner {
    width: u32,
    height: u32,
    resized: bool,
    closing: bool,
    events: u64,
}

/// Window state written by the event loop and read by the render thread.
#[derive(Debug)]
pub struct WindowState {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl WindowState {
    /// Create state for a window of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                width,
                height,
                resized: false,
                closing: false,
                events: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Create state matching a winit window's current size.
    pub fn from_window(window: &Window) -> Self {
        let size = window.inner_size();
        Self::new(size.width, size.height)
    }

    /// Record a resize. A size of zero (minimized) is recorded as-is.
    pub fn notify_resized(&self, width: u32, height: u32) {
        let mut inner = self.inner.lock();
        inner.width = width;
        inner.height = height;
        inner.resized = true;
        inner.events += 1;
        drop(inner);
        self.changed.notify_all();
    }

    /// Mark the window as closing and wake any waiter.
    pub fn request_close(&self) {
        let mut inner = self.inner.lock();
        inner.closing = true;
        inner.events += 1;
        drop(inner);
        self.changed.notify_all();
        tracing::debug!("Window close requested");
    }
}

impl WindowProvider for WindowState {
    fn extent(&self) -> (u32, u32) {
        let inner = self.inner.lock();
        (inner.width, inner.height)
    }

    fn was_resized(&self) -> bool {
        self.inner.lock().resized
    }

    fn reset_resized(&self) {
        self.inner.lock().resized = false;
    }

    fn should_close(&self) -> bool {
        self.inner.lock().closing
    }

    fn wait_events(&self, timeout: Duration) {
        let mut inner = self.inner.lock();
        if inner.closing {
            return;
        }
        let seen = inner.events;
        // Spurious wakeups re-check the counter; the timeout bounds the whole wait
        let _ = self
            .changed
            .wait_while_for(&mut inner, |inner| inner.events == seen, timeout);
    }
}
