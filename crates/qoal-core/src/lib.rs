//! Core types, configuration and logging for the Qoal engine.
//!
//! This crate provides the foundational pieces shared by every other crate:
//! - Engine-wide constants
//! - [`EngineConfig`] and the renderer republish policy
//! - Mesh handles and vertex layout selectors
//! - Logging setup on top of `tracing-subscriber`
//! - Common error type

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{EngineConfig, RepublishPolicy};
pub use error::{Error, Result};
pub use types::{MeshHandle, MeshHandleAllocator, VertexLayout};

/// Engine-wide constants
pub mod constants {
    /// Number of frames that may have outstanding GPU work at once.
    pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
    /// Minimum number of vertices a mesh must have.
    pub const MIN_MESH_VERTICES: usize = 3;
    /// Background colour the swapchain image is cleared to.
    pub const CLEAR_COLOUR: [f32; 4] = [0.01, 0.01, 0.01, 1.0];
}
