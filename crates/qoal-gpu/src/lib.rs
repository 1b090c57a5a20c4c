//! Vulkan abstraction layer for the Qoal engine.
//!
//! This crate provides:
//! - Vulkan instance creation and the validation debug messenger
//! - Device selection with graphics and present queues
//! - Memory allocation via gpu-allocator
//! - Swapchain, render pass and framebuffer handling
//! - Frame synchronization and command buffer helpers
//! - Graphics pipelines built from SPIR-V shader pairs

pub mod command;
pub mod context;
pub mod debug;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use debug::DebugMessenger;
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use shader::ShaderPair;
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{ImageAcquire, PresentTargets, Swapchain};
pub use sync::{FenceWait, FrameSync, FrameSyncRing};
