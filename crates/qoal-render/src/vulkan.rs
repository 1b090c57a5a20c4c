//! [`RenderBackend`] over a real Vulkan device.

use std::path::PathBuf;

use ash::vk;
use qoal_core::constants::MAX_FRAMES_IN_FLIGHT;
use qoal_core::EngineConfig;
use qoal_gpu::command::{begin_command_buffer, end_command_buffer, submit_command_buffer};
use qoal_gpu::swapchain::calculate_extent;
use qoal_gpu::sync::FrameSync;
use qoal_gpu::{
    CommandPool, FenceWait, FrameSyncRing, GpuBuffer, GpuContext, GpuContextBuilder, GpuError,
    GraphicsPipeline, GraphicsPipelineConfig, ImageAcquire, PresentTargets, Result, SurfaceContext,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::backend::{AcquireOutcome, CommandRecorder, PresentOutcome, RenderBackend};
use crate::kind::RendererKind;
use crate::vertex::vertex_input;

/// Owns every Vulkan object the render thread uses.
///
/// Objects are created as context, surface, present targets, command pool,
/// sync ring and destroyed in reverse. The context field is declared last so
/// it drops after [`Drop::drop`] has released everything built on it.
pub struct VulkanBackend {
    targets: Option<PresentTargets>,
    sync: FrameSyncRing,
    command_pool: CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    swapchain_loader: ash::khr::swapchain::Device,
    surface: SurfaceContext,
    /// Chosen once so rebuilt render passes stay compatible with live pipelines.
    surface_format: vk::SurfaceFormatKHR,
    vsync: bool,
    shader_dir: PathBuf,
    context: GpuContext,
}

impl VulkanBackend {
    /// Bring up Vulkan for a window of `width` x `height` pixels.
    pub fn new<W>(window: &W, width: u32, height: u32, config: &EngineConfig) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let (context, surface) = GpuContextBuilder::new()
            .app_name(config.title.clone())
            .validation(config.validation)
            .build(window)?;

        let swapchain_loader = ash::khr::swapchain::Device::new(context.instance(), context.device());

        let resources = unsafe {
            create_frame_resources(&context, &surface, &swapchain_loader, width, height, config.vsync)
        };
        let (surface_format, targets, command_pool, command_buffers, sync) = match resources {
            Ok(resources) => resources,
            Err(e) => {
                unsafe { surface.destroy() };
                return Err(e);
            }
        };

        tracing::info!(
            "Vulkan backend ready: {} frames in flight, {} swapchain images, validation {}",
            sync.len(),
            targets.image_count(),
            if context.validation_enabled() { "on" } else { "off" }
        );

        Ok(Self {
            targets: Some(targets),
            sync,
            command_pool,
            command_buffers,
            swapchain_loader,
            surface,
            surface_format,
            vsync: config.vsync,
            shader_dir: config.shader_dir.clone(),
            context,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    fn targets(&self) -> Result<&PresentTargets> {
        self.targets
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Swapchain not built".to_string()))
    }

    fn frame_sync(&self, slot: usize) -> Result<&FrameSync> {
        self.sync
            .slot(slot)
            .ok_or_else(|| GpuError::InvalidState(format!("No sync slot {slot}")))
    }
}

type FrameResources = (
    vk::SurfaceFormatKHR,
    PresentTargets,
    CommandPool,
    Vec<vk::CommandBuffer>,
    FrameSyncRing,
);

/// Present targets, command pool, one command buffer per slot and the sync ring.
///
/// # Safety
/// The context, surface and loader must be valid and belong together.
unsafe fn create_frame_resources(
    context: &GpuContext,
    surface: &SurfaceContext,
    swapchain_loader: &ash::khr::swapchain::Device,
    width: u32,
    height: u32,
    vsync: bool,
) -> Result<FrameResources> {
    let device = context.device();
    let surface_format = surface
        .capabilities(context.physical_device())?
        .recommended_format()?;

    let targets = create_targets(context, surface, swapchain_loader, surface_format, vsync, width, height)?;

    let command_pool = match CommandPool::new(device, context.queue_families().graphics) {
        Ok(pool) => pool,
        Err(e) => {
            targets.destroy(device, swapchain_loader);
            return Err(e);
        }
    };

    let command_buffers = match command_pool.allocate_primary(device, MAX_FRAMES_IN_FLIGHT as u32) {
        Ok(buffers) => buffers,
        Err(e) => {
            command_pool.destroy(device);
            targets.destroy(device, swapchain_loader);
            return Err(e);
        }
    };

    let sync = match FrameSyncRing::new(device, MAX_FRAMES_IN_FLIGHT) {
        Ok(sync) => sync,
        Err(e) => {
            command_pool.destroy(device);
            targets.destroy(device, swapchain_loader);
            return Err(e);
        }
    };

    Ok((surface_format, targets, command_pool, command_buffers, sync))
}

/// Swapchain, render pass and framebuffers for the surface's current state.
///
/// # Safety
/// No other swapchain may exist on the surface.
unsafe fn create_targets(
    context: &GpuContext,
    surface: &SurfaceContext,
    swapchain_loader: &ash::khr::swapchain::Device,
    surface_format: vk::SurfaceFormatKHR,
    vsync: bool,
    width: u32,
    height: u32,
) -> Result<PresentTargets> {
    let capabilities = surface.capabilities(context.physical_device())?;
    let present_mode = capabilities.recommended_present_mode(vsync);
    let extent = calculate_extent(&capabilities.capabilities, width, height);

    PresentTargets::new(
        context.device(),
        swapchain_loader,
        surface.surface,
        &capabilities.capabilities,
        surface_format,
        present_mode,
        extent,
        context.queue_families(),
    )
}

impl CommandRecorder for VulkanBackend {
    fn cmd_bind_pipeline(&mut self, cmd: vk::CommandBuffer, pipeline: &GraphicsPipeline) {
        unsafe {
            self.context.device().cmd_bind_pipeline(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.pipeline,
            );
        }
    }

    fn cmd_bind_vertex_buffer(&mut self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe {
            self.context
                .device()
                .cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]);
        }
    }

    fn cmd_draw(&mut self, cmd: vk::CommandBuffer, vertex_count: u32) {
        unsafe {
            self.context.device().cmd_draw(cmd, vertex_count, 1, 0, 0);
        }
    }
}

impl RenderBackend for VulkanBackend {
    fn frames_in_flight(&self) -> usize {
        self.sync.len()
    }

    fn image_count(&self) -> usize {
        self.targets.as_ref().map_or(0, PresentTargets::image_count)
    }

    fn extent(&self) -> vk::Extent2D {
        self.targets
            .as_ref()
            .map(|targets| targets.swapchain.extent)
            .unwrap_or_default()
    }

    fn wait_for_slot(&mut self, slot: usize, timeout_ns: u64) -> Result<FenceWait> {
        let sync = self.frame_sync(slot)?;
        unsafe { sync.wait(self.context.device(), timeout_ns) }
    }

    fn acquire_next_image(&mut self, slot: usize, timeout_ns: u64) -> Result<AcquireOutcome> {
        let semaphore = self.frame_sync(slot)?.image_available;
        let acquired = unsafe {
            self.targets()?
                .swapchain
                .acquire_next_image(&self.swapchain_loader, semaphore, timeout_ns)?
        };
        Ok(match acquired {
            ImageAcquire::Image { index, suboptimal } => {
                AcquireOutcome::Acquired { index, suboptimal }
            }
            ImageAcquire::OutOfDate => AcquireOutcome::OutOfDate,
            ImageAcquire::NotReady => AcquireOutcome::NotReady,
        })
    }

    fn begin_command_buffer(&mut self, slot: usize) -> Result<vk::CommandBuffer> {
        let cmd = self.command_buffer(slot);
        if cmd == vk::CommandBuffer::null() {
            return Err(GpuError::InvalidState(format!("No command buffer for slot {slot}")));
        }
        unsafe {
            begin_command_buffer(
                self.context.device(),
                cmd,
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            )?;
        }
        Ok(cmd)
    }

    fn command_buffer(&self, slot: usize) -> vk::CommandBuffer {
        self.command_buffers.get(slot).copied().unwrap_or_default()
    }

    fn cmd_begin_renderpass(&mut self, cmd: vk::CommandBuffer, image: u32, clear: [f32; 4]) {
        let Some(targets) = self.targets.as_ref() else {
            tracing::error!("Render pass begun without a swapchain");
            return;
        };
        let Some(&framebuffer) = targets.framebuffers.get(image as usize) else {
            tracing::error!("No framebuffer for swapchain image {image}");
            return;
        };

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        }];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(targets.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: targets.swapchain.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            self.context
                .device()
                .cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_set_viewport_scissor(&mut self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        let device = self.context.device();
        unsafe {
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn cmd_end_renderpass(&mut self, cmd: vk::CommandBuffer) {
        unsafe {
            self.context.device().cmd_end_render_pass(cmd);
        }
    }

    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { end_command_buffer(self.context.device(), cmd) }
    }

    fn submit(&mut self, slot: usize, cmd: vk::CommandBuffer) -> Result<()> {
        let device = self.context.device();
        let sync = self.frame_sync(slot)?;
        unsafe {
            sync.reset(device)?;
            submit_command_buffer(
                device,
                self.context.graphics_queue(),
                cmd,
                sync.image_available,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                sync.render_finished,
                sync.in_flight,
            )
        }
    }

    fn present(&mut self, slot: usize, image: u32) -> Result<PresentOutcome> {
        let render_finished = self.frame_sync(slot)?.render_finished;
        let presented = unsafe {
            self.targets()?.swapchain.present(
                &self.swapchain_loader,
                self.context.present_queue(),
                image,
                &[render_finished],
            )?
        };
        Ok(match presented {
            Some(false) => PresentOutcome::Presented,
            Some(true) => PresentOutcome::Suboptimal,
            None => PresentOutcome::OutOfDate,
        })
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.context.wait_idle()
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        let device = self.context.device();
        unsafe {
            self.sync.destroy(device);
            if let Some(targets) = self.targets.take() {
                targets.destroy(device, &self.swapchain_loader);
            }

            let targets = create_targets(
                &self.context,
                &self.surface,
                &self.swapchain_loader,
                self.surface_format,
                self.vsync,
                width,
                height,
            )?;
            self.targets = Some(targets);
            self.sync = FrameSyncRing::new(device, MAX_FRAMES_IN_FLIGHT)?;
        }
        Ok(())
    }

    fn create_pipeline(&mut self, kind: RendererKind) -> Result<GraphicsPipeline> {
        let (vertex_shader, fragment_shader) = kind.shaders(&self.shader_dir).load()?;
        let (vertex_bindings, vertex_attributes) = vertex_input(kind.layout());

        let config = GraphicsPipelineConfig {
            vertex_shader,
            fragment_shader,
            vertex_bindings,
            vertex_attributes,
            topology: kind.topology(),
            render_pass: self.targets()?.render_pass,
            ..Default::default()
        };

        let pipeline = unsafe { GraphicsPipeline::new(self.context.device(), &config)? };
        tracing::info!("Created {kind:?} pipeline from {}", kind.shader_stem());
        Ok(pipeline)
    }

    fn destroy_pipeline(&mut self, pipeline: GraphicsPipeline) {
        unsafe { pipeline.destroy(self.context.device()) };
    }

    fn upload_buffer(
        &mut self,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
        name: &str,
    ) -> Result<GpuBuffer> {
        self.context
            .allocator()
            .lock()
            .create_buffer_with_data(bytes, usage, name)
    }

    fn destroy_buffer(&mut self, mut buffer: GpuBuffer) {
        if let Err(e) = self.context.allocator().lock().free_buffer(&mut buffer) {
            tracing::warn!("Failed to free buffer: {e}");
        }
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            tracing::error!("Failed to wait for device idle: {e}");
        }

        let device = self.context.device();
        unsafe {
            self.sync.destroy(device);
            if let Some(targets) = self.targets.take() {
                targets.destroy(device, &self.swapchain_loader);
            }
            self.command_pool.destroy(device);
            self.surface.destroy();
        }
        tracing::debug!("Vulkan backend destroyed");
    }
}
