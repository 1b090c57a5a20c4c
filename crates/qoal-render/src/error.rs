//! Render error types.

use ash::vk;
use qoal_core::MeshHandle;
use qoal_gpu::GpuError;
use thiserror::Error;

/// Errors from the frame cycle, mesh handling and the registry.
#[derive(Error, Debug)]
pub enum RenderError {
    /// `begin_frame` called while a frame is already being recorded.
    #[error("A frame is already in progress")]
    FrameAlreadyInProgress,

    /// A frame operation was called outside the phase it belongs to.
    #[error("No frame in progress for this operation")]
    NoFrameInProgress,

    /// `end_frame` called before the render pass was ended.
    #[error("The render pass is still active")]
    RenderpassStillActive,

    /// The command buffer does not belong to the current frame slot.
    #[error("Command buffer does not belong to the current frame")]
    WrongFrameCommandBuffer,

    /// Acquiring a swapchain image failed for a reason other than an
    /// out-of-date or suboptimal surface.
    #[error("Failed to acquire swapchain image: {0}")]
    SurfaceAcquire(vk::Result),

    /// A mesh needs at least three vertices.
    #[error("Mesh has {len} vertices, at least {min} are required")]
    TooFewVertices { len: usize, min: usize },

    /// An index points past the end of the vertex list.
    #[error("Index {index} out of range for {len} vertices")]
    IndexOutOfRange { index: u32, len: usize },

    /// The mesh pool has no mesh for this handle.
    #[error("Unknown mesh {0:?}")]
    UnknownMesh(MeshHandle),

    /// GPU error.
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
