//! Platform abstraction for the Qoal engine.
//!
//! Window state shared between the event loop thread and the render thread,
//! and the narrow [`WindowProvider`] interface the renderer consumes.

mod state;

pub use state::WindowState;

use std::sync::Arc;
use std::time::Duration;

use qoal_core::EngineConfig;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
    #[error("Window handle unavailable: {0}")]
    Handle(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// What the renderer needs to know about its window.
pub trait WindowProvider: Send + Sync {
    /// Current framebuffer size in pixels.
    fn extent(&self) -> (u32, u32);

    /// Whether the window was resized since the flag was last reset.
    fn was_resized(&self) -> bool;

    /// Clear the resize flag.
    fn reset_resized(&self);

    /// Whether the window has been asked to close.
    fn should_close(&self) -> bool;

    /// Block until a window event arrives or the timeout passes.
    fn wait_events(&self, timeout: Duration);
}

impl<T: WindowProvider + ?Sized> WindowProvider for Arc<T> {
    fn extent(&self) -> (u32, u32) {
        (**self).extent()
    }

    fn was_resized(&self) -> bool {
        (**self).was_resized()
    }

    fn reset_resized(&self) {
        (**self).reset_resized();
    }

    fn should_close(&self) -> bool {
        (**self).should_close()
    }

    fn wait_events(&self, timeout: Duration) {
        (**self).wait_events(timeout);
    }
}

/// Window attributes for the engine's main window.
pub fn window_attributes(config: &EngineConfig) -> WindowAttributes {
    Window::default_attributes()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(true)
}

/// Get raw handles from a window for Vulkan surface creation.
pub fn raw_handles(window: &Window) -> Result<(RawDisplayHandle, RawWindowHandle)> {
    let display = window
        .display_handle()
        .map_err(|e| PlatformError::Handle(e.to_string()))?
        .as_raw();
    let handle = window
        .window_handle()
        .map_err(|e| PlatformError::Handle(e.to_string()))?
        .as_raw();
    Ok((display, handle))
}
