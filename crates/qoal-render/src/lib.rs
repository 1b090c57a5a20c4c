//! Frame lifecycle and scene rendering for the Qoal engine.
//!
//! This crate provides:
//! - The per-frame submission state machine with swapchain recreation
//! - The [`RenderBackend`] seam and its Vulkan implementation
//! - Vertex layouts, mesh data and the mesh pool arena
//! - Renderer kinds, staged assignments, snapshots and the live registry

pub mod assign;
pub mod backend;
pub mod error;
pub mod frame;
pub mod kind;
pub mod mesh;
pub mod registry;
pub mod snapshot;
pub mod vertex;
pub mod vulkan;

pub use assign::RendererAssignments;
pub use backend::{AcquireOutcome, CommandRecorder, PresentOutcome, RenderBackend};
pub use error::{RenderError, Result};
pub use frame::{BeginFrame, EndFrame, FrameCycle, FramePhase};
pub use kind::RendererKind;
pub use mesh::{MeshData, MeshPool, MeshSource, Vertices};
pub use registry::{Renderer, RendererRegistry};
pub use snapshot::{DrawItem, RegistrySnapshot};
pub use vertex::{Vertex2D, Vertex3D};
pub use vulkan::VulkanBackend;
