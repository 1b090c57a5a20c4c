//! Test doubles for the Qoal engine.
//!
//! [`RecordingBackend`] implements the same backend trait as the Vulkan
//! backend and records what the frame cycle, registry and mesh pool ask of
//! it. [`ScriptedWindow`] plays back a sequence of window extents.

mod backend;
mod window;

pub use backend::{DrawCall, Recording, RecordingBackend, Upload};
pub use window::ScriptedWindow;
