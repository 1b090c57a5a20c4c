//! The seam between frame logic and the GPU.
//!
//! [`FrameCycle`](crate::FrameCycle), the registry and the mesh pool only talk
//! to the GPU through these traits. [`VulkanBackend`](crate::VulkanBackend) is
//! the real implementation; tests use a recording fake.

use ash::vk;
use qoal_gpu::{FenceWait, GpuBuffer, GraphicsPipeline, Result};

use crate::kind::RendererKind;

/// Result of acquiring a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { index: u32, suboptimal: bool },
    /// No image was acquired; the swapchain must be recreated.
    OutOfDate,
    /// No image became available within the timeout.
    NotReady,
}

/// Result of presenting an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    pub fn needs_recreation(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// Commands a renderer records inside an active render pass.
pub trait CommandRecorder {
    fn cmd_bind_pipeline(&mut self, cmd: vk::CommandBuffer, pipeline: &GraphicsPipeline);
    fn cmd_bind_vertex_buffer(&mut self, cmd: vk::CommandBuffer, buffer: vk::Buffer);
    /// Non-indexed draw of `vertex_count` vertices, one instance.
    fn cmd_draw(&mut self, cmd: vk::CommandBuffer, vertex_count: u32);
}

/// Swapchain, sync ring, command buffers and resource creation.
pub trait RenderBackend: CommandRecorder {
    /// Size of the sync ring.
    fn frames_in_flight(&self) -> usize;

    /// Number of swapchain images.
    fn image_count(&self) -> usize;

    fn extent(&self) -> vk::Extent2D;

    /// Wait on a slot's in-flight fence.
    fn wait_for_slot(&mut self, slot: usize, timeout_ns: u64) -> Result<FenceWait>;

    /// Acquire the next image, signalling the slot's image-available semaphore.
    /// Waits at most `timeout_ns` for an image.
    fn acquire_next_image(&mut self, slot: usize, timeout_ns: u64) -> Result<AcquireOutcome>;

    /// Reset and begin the slot's command buffer.
    fn begin_command_buffer(&mut self, slot: usize) -> Result<vk::CommandBuffer>;

    /// The command buffer owned by a slot.
    fn command_buffer(&self, slot: usize) -> vk::CommandBuffer;

    /// Begin the render pass on an image's framebuffer, clearing it.
    fn cmd_begin_renderpass(&mut self, cmd: vk::CommandBuffer, image: u32, clear: [f32; 4]);

    /// Full-extent viewport and scissor.
    fn cmd_set_viewport_scissor(&mut self, cmd: vk::CommandBuffer, extent: vk::Extent2D);

    fn cmd_end_renderpass(&mut self, cmd: vk::CommandBuffer);

    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> Result<()>;

    /// Reset the slot's fence and submit, waiting on image-available at
    /// colour attachment output and signalling render-finished.
    fn submit(&mut self, slot: usize, cmd: vk::CommandBuffer) -> Result<()>;

    /// Present an image once the slot's render-finished semaphore signals.
    fn present(&mut self, slot: usize, image: u32) -> Result<PresentOutcome>;

    fn wait_idle(&mut self) -> Result<()>;

    /// Tear down and rebuild sync objects, framebuffers, render pass, image
    /// views and swapchain for a window of the given size.
    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()>;

    /// Build the pipeline for a renderer kind.
    fn create_pipeline(&mut self, kind: RendererKind) -> Result<GraphicsPipeline>;

    fn destroy_pipeline(&mut self, pipeline: GraphicsPipeline);

    /// Create a host-visible buffer holding `bytes`.
    fn upload_buffer(
        &mut self,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
        name: &str,
    ) -> Result<GpuBuffer>;

    fn destroy_buffer(&mut self, buffer: GpuBuffer);
}
