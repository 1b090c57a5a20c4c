//! Recording fake of the render backend.

use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk::{self, Handle};
use parking_lot::{Mutex, MutexGuard};
use qoal_core::constants::MAX_FRAMES_IN_FLIGHT;
use qoal_gpu::{FenceWait, GpuBuffer, GpuError, GraphicsPipeline, Result};
use qoal_render::{AcquireOutcome, CommandRecorder, PresentOutcome, RenderBackend, RendererKind};

const COMMAND_BUFFER_BASE: u64 = 0xC0;

/// One recorded draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Number of frames submitted before this draw was recorded.
    pub frame: usize,
    pub pipeline: vk::Pipeline,
    pub buffer: vk::Buffer,
    pub vertex_count: u32,
}

/// One buffer upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upload {
    pub buffer: vk::Buffer,
    pub usage: vk::BufferUsageFlags,
    pub size: u64,
}

/// Everything the fake observed, plus the scripts it plays back.
///
/// Shared between the backend and the test through [`RecordingBackend::recording`],
/// so it stays readable after the backend moved to another thread.
#[derive(Debug)]
pub struct Recording {
    pub image_count: usize,
    pub extent: vk::Extent2D,

    /// Outcomes returned by upcoming acquires, before falling back to
    /// round-robin images.
    pub acquire_script: VecDeque<std::result::Result<AcquireOutcome, vk::Result>>,
    /// Outcomes returned by upcoming presents, before falling back to `Presented`.
    pub present_script: VecDeque<PresentOutcome>,
    /// Results of upcoming fence waits, before falling back to `Signaled`.
    pub wait_script: VecDeque<FenceWait>,
    /// Kinds whose pipeline creation fails.
    pub failing_pipelines: Vec<RendererKind>,

    pub ring_size: usize,
    pub live_framebuffers: usize,
    pub live_image_views: usize,
    pub live_pipelines: Vec<(vk::Pipeline, RendererKind)>,
    pub live_buffers: usize,

    pub fence_waits: Vec<usize>,
    pub acquires: usize,
    /// Timeout passed to each acquire.
    pub acquire_timeouts: Vec<u64>,
    pub renderpasses: usize,
    pub clear_colours: Vec<[f32; 4]>,
    pub viewports: Vec<vk::Extent2D>,
    pub pipeline_binds: usize,
    pub draws: Vec<DrawCall>,
    pub submits: usize,
    pub presents: usize,
    pub wait_idles: usize,
    pub recreations: usize,
    pub recreated_extents: Vec<(u32, u32)>,
    pub pipelines_created: Vec<RendererKind>,
    pub pipelines_destroyed: usize,
    pub uploads: Vec<Upload>,
    pub buffers_destroyed: usize,

    /// Live pipelines and buffers when the backend was dropped.
    pub dropped_with: Option<(usize, usize)>,

    next_image: u32,
    next_handle: u64,
    recording: Option<vk::CommandBuffer>,
    in_renderpass: bool,
    bound_pipeline: vk::Pipeline,
    bound_buffer: vk::Buffer,
}

impl Recording {
    fn new(image_count: usize, extent: vk::Extent2D) -> Self {
        Self {
            image_count,
            extent,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            wait_script: VecDeque::new(),
            failing_pipelines: Vec::new(),
            ring_size: MAX_FRAMES_IN_FLIGHT,
            live_framebuffers: image_count,
            live_image_views: image_count,
            live_pipelines: Vec::new(),
            live_buffers: 0,
            fence_waits: Vec::new(),
            acquires: 0,
            acquire_timeouts: Vec::new(),
            renderpasses: 0,
            clear_colours: Vec::new(),
            viewports: Vec::new(),
            pipeline_binds: 0,
            draws: Vec::new(),
            submits: 0,
            presents: 0,
            wait_idles: 0,
            recreations: 0,
            recreated_extents: Vec::new(),
            pipelines_created: Vec::new(),
            pipelines_destroyed: 0,
            uploads: Vec::new(),
            buffers_destroyed: 0,
            dropped_with: None,
            next_image: 0,
            next_handle: 1,
            recording: None,
            in_renderpass: false,
            bound_pipeline: vk::Pipeline::null(),
            bound_buffer: vk::Buffer::null(),
        }
    }

    /// Draws recorded while the given frame (0-based) was being built.
    pub fn draws_in_frame(&self, frame: usize) -> Vec<DrawCall> {
        self.draws.iter().copied().filter(|d| d.frame == frame).collect()
    }

    /// Kind of a live pipeline.
    pub fn pipeline_kind(&self, pipeline: vk::Pipeline) -> Option<RendererKind> {
        self.live_pipelines
            .iter()
            .find(|(p, _)| *p == pipeline)
            .map(|&(_, kind)| kind)
    }

    fn handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

/// Called with the new extent after every swapchain rebuild.
type RecreateHook = Box<dyn FnMut(u32, u32) + Send>;

/// Render backend that touches no GPU.
///
/// Protocol violations (drawing outside a render pass, ending a command
/// buffer that was never begun) panic.
pub struct RecordingBackend {
    recording: Arc<Mutex<Recording>>,
    on_recreate: Option<RecreateHook>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// Three swapchain images at 800x600.
    pub fn new() -> Self {
        Self::with_images(3, 800, 600)
    }

    pub fn with_images(image_count: usize, width: u32, height: u32) -> Self {
        let extent = vk::Extent2D { width, height };
        Self {
            recording: Arc::new(Mutex::new(Recording::new(image_count, extent))),
            on_recreate: None,
        }
    }

    /// Run `hook` inside every swapchain rebuild, after the new targets exist.
    pub fn on_recreate(&mut self, hook: impl FnMut(u32, u32) + Send + 'static) {
        self.on_recreate = Some(Box::new(hook));
    }

    /// Shared view of the recording.
    pub fn recording(&self) -> Arc<Mutex<Recording>> {
        Arc::clone(&self.recording)
    }

    /// Lock the recording.
    pub fn state(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock()
    }
}

fn command_buffer_for(slot: usize) -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(COMMAND_BUFFER_BASE + slot as u64)
}

impl CommandRecorder for RecordingBackend {
    fn cmd_bind_pipeline(&mut self, cmd: vk::CommandBuffer, pipeline: &GraphicsPipeline) {
        let mut state = self.state();
        assert!(state.in_renderpass, "pipeline bound outside a render pass");
        assert_eq!(state.recording, Some(cmd));
        state.bound_pipeline = pipeline.pipeline;
        state.pipeline_binds += 1;
    }

    fn cmd_bind_vertex_buffer(&mut self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        let mut state = self.state();
        assert_eq!(state.recording, Some(cmd));
        state.bound_buffer = buffer;
    }

    fn cmd_draw(&mut self, cmd: vk::CommandBuffer, vertex_count: u32) {
        let mut state = self.state();
        assert!(state.in_renderpass, "draw outside a render pass");
        assert_eq!(state.recording, Some(cmd));
        let draw = DrawCall {
            frame: state.submits,
            pipeline: state.bound_pipeline,
            buffer: state.bound_buffer,
            vertex_count,
        };
        state.draws.push(draw);
    }
}

impl RenderBackend for RecordingBackend {
    fn frames_in_flight(&self) -> usize {
        self.state().ring_size
    }

    fn image_count(&self) -> usize {
        self.state().image_count
    }

    fn extent(&self) -> vk::Extent2D {
        self.state().extent
    }

    fn wait_for_slot(&mut self, slot: usize, _timeout_ns: u64) -> Result<FenceWait> {
        let mut state = self.state();
        assert!(slot < state.ring_size, "slot {slot} outside the ring");
        state.fence_waits.push(slot);
        Ok(state.wait_script.pop_front().unwrap_or(FenceWait::Signaled))
    }

    fn acquire_next_image(&mut self, _slot: usize, timeout_ns: u64) -> Result<AcquireOutcome> {
        let mut state = self.state();
        state.acquires += 1;
        state.acquire_timeouts.push(timeout_ns);
        match state.acquire_script.pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(code)) => Err(GpuError::Vulkan(code)),
            None => {
                let index = state.next_image;
                state.next_image = (index + 1) % state.image_count.max(1) as u32;
                Ok(AcquireOutcome::Acquired {
                    index,
                    suboptimal: false,
                })
            }
        }
    }

    fn begin_command_buffer(&mut self, slot: usize) -> Result<vk::CommandBuffer> {
        let mut state = self.state();
        assert!(state.recording.is_none(), "command buffer already recording");
        let cmd = command_buffer_for(slot);
        state.recording = Some(cmd);
        Ok(cmd)
    }

    fn command_buffer(&self, slot: usize) -> vk::CommandBuffer {
        command_buffer_for(slot)
    }

    fn cmd_begin_renderpass(&mut self, cmd: vk::CommandBuffer, image: u32, clear: [f32; 4]) {
        let mut state = self.state();
        assert_eq!(state.recording, Some(cmd));
        assert!(!state.in_renderpass, "render pass begun twice");
        assert!((image as usize) < state.live_framebuffers, "no framebuffer for image {image}");
        state.in_renderpass = true;
        state.renderpasses += 1;
        state.clear_colours.push(clear);
    }

    fn cmd_set_viewport_scissor(&mut self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let mut state = self.state();
        assert_eq!(state.recording, Some(cmd));
        state.viewports.push(extent);
    }

    fn cmd_end_renderpass(&mut self, cmd: vk::CommandBuffer) {
        let mut state = self.state();
        assert_eq!(state.recording, Some(cmd));
        assert!(state.in_renderpass, "render pass ended without being begun");
        state.in_renderpass = false;
    }

    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        let mut state = self.state();
        assert_eq!(state.recording, Some(cmd), "ending a command buffer that is not recording");
        assert!(!state.in_renderpass, "command buffer ended inside a render pass");
        state.recording = None;
        Ok(())
    }

    fn submit(&mut self, _slot: usize, _cmd: vk::CommandBuffer) -> Result<()> {
        self.state().submits += 1;
        Ok(())
    }

    fn present(&mut self, _slot: usize, _image: u32) -> Result<PresentOutcome> {
        let mut state = self.state();
        state.presents += 1;
        Ok(state
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.state().wait_idles += 1;
        Ok(())
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        let mut state = self.state();
        state.ring_size = 0;
        state.live_framebuffers = 0;
        state.live_image_views = 0;

        state.extent = vk::Extent2D { width, height };
        state.live_image_views = state.image_count;
        state.live_framebuffers = state.image_count;
        state.ring_size = MAX_FRAMES_IN_FLIGHT;
        state.next_image = 0;
        state.recreations += 1;
        state.recreated_extents.push((width, height));
        drop(state);

        if let Some(hook) = self.on_recreate.as_mut() {
            hook(width, height);
        }
        Ok(())
    }

    fn create_pipeline(&mut self, kind: RendererKind) -> Result<GraphicsPipeline> {
        let mut state = self.state();
        if state.failing_pipelines.contains(&kind) {
            return Err(GpuError::PipelineCreation(format!("{kind:?} scripted to fail")));
        }
        let pipeline = vk::Pipeline::from_raw(state.handle());
        let layout = vk::PipelineLayout::from_raw(state.handle());
        state.live_pipelines.push((pipeline, kind));
        state.pipelines_created.push(kind);
        Ok(GraphicsPipeline { pipeline, layout })
    }

    fn destroy_pipeline(&mut self, pipeline: GraphicsPipeline) {
        let mut state = self.state();
        let before = state.live_pipelines.len();
        state.live_pipelines.retain(|(p, _)| *p != pipeline.pipeline);
        assert_eq!(state.live_pipelines.len() + 1, before, "unknown pipeline destroyed");
        state.pipelines_destroyed += 1;
    }

    fn upload_buffer(
        &mut self,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
        _name: &str,
    ) -> Result<GpuBuffer> {
        let mut state = self.state();
        let buffer = vk::Buffer::from_raw(state.handle());
        let size = bytes.len() as u64;
        state.live_buffers += 1;
        state.uploads.push(Upload {
            buffer,
            usage,
            size,
        });
        Ok(GpuBuffer {
            buffer,
            allocation: None,
            size,
        })
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        let mut state = self.state();
        assert!(state.uploads.iter().any(|u| u.buffer == buffer.buffer), "unknown buffer destroyed");
        state.live_buffers -= 1;
        state.buffers_destroyed += 1;
    }
}

impl Drop for RecordingBackend {
    fn drop(&mut self) {
        let mut state = self.state();
        let live = (state.live_pipelines.len(), state.live_buffers);
        state.dropped_with = Some(live);
        state.ring_size = 0;
        state.live_framebuffers = 0;
        state.live_image_views = 0;
    }
}
