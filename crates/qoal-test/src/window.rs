//! Window provider that plays back a script of extents.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use qoal_platform::WindowProvider;

#[derive(Debug)]
struct Inner {
    extent: (u32, u32),
    upcoming: VecDeque<(u32, u32)>,
    resized: bool,
    closing: bool,
    close_when_drained: bool,
    waits: usize,
}

/// Each `wait_events` call moves to the next scripted extent.
///
/// Never blocks, so frame-cycle tests stay deterministic.
#[derive(Debug)]
pub struct ScriptedWindow {
    inner: Mutex<Inner>,
}

impl ScriptedWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                extent: (width, height),
                upcoming: VecDeque::new(),
                resized: false,
                closing: false,
                close_when_drained: false,
                waits: 0,
            }),
        }
    }

    /// Raise the resize flag with a new extent.
    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.inner.lock();
        inner.extent = (width, height);
        inner.resized = true;
    }

    /// Extents reported after each successive `wait_events`.
    pub fn then_extents(&self, extents: impl IntoIterator<Item = (u32, u32)>) {
        self.inner.lock().upcoming.extend(extents);
    }

    /// Close the window once every scripted extent has been played.
    pub fn close_after_script(&self) {
        self.inner.lock().close_when_drained = true;
    }

    pub fn request_close(&self) {
        self.inner.lock().closing = true;
    }

    /// Number of `wait_events` calls so far.
    pub fn waits(&self) -> usize {
        self.inner.lock().waits
    }
}

impl WindowProvider for ScriptedWindow {
    fn extent(&self) -> (u32, u32) {
        self.inner.lock().extent
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

    fn wait_events(&self, _timeout: Duration) {
        let mut inner = self.inner.lock();
        inner.waits += 1;
        match inner.upcoming.pop_front() {
            Some(extent) => inner.extent = extent,
            None if inner.close_when_drained => inner.closing = true,
            None => {}
        }
    }
}
