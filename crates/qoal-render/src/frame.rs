//! Per-frame submission state machine.
//!
//! A frame moves `Idle -> FrameStarted -> RenderpassActive -> FrameStarted
//! -> Idle`. Out-of-date and suboptimal surfaces and window resizes are
//! routed through swapchain recreation and never surface as errors.

use std::time::Duration;

use ash::vk;
use qoal_core::EngineConfig;
use qoal_gpu::{FenceWait, GpuError};
use qoal_platform::WindowProvider;

use crate::backend::{AcquireOutcome, RenderBackend};
use crate::error::{RenderError, Result};

/// How long a zero-extent wait blocks before re-checking the window.
const EXTENT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    FrameStarted,
    RenderpassActive,
}

/// Outcome of [`FrameCycle::begin_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginFrame {
    /// Recording may start on this command buffer.
    Ready(vk::CommandBuffer),
    /// The surface was out of date and has been rebuilt; no frame this time.
    Recreated,
    /// A fence wait or image acquire timed out; try again on the next iteration.
    Stalled,
    /// The window closed while waiting for a usable extent.
    Closing,
}

/// Outcome of [`FrameCycle::end_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndFrame {
    Presented,
    /// Presented, then the swapchain was rebuilt.
    Recreated,
    /// Presented, then the window closed during recreation.
    Closing,
}

/// Drives acquire, record, submit and present against a [`RenderBackend`].
pub struct FrameCycle<B, W> {
    backend: B,
    window: W,
    phase: FramePhase,
    slot: usize,
    /// Image acquired for the current frame. Survives a stalled begin so the
    /// retry does not acquire twice.
    image: Option<u32>,
    /// Slot whose submission last used each swapchain image.
    images_in_flight: Vec<Option<usize>>,
    fence_timeout_ns: u64,
    clear_colour: [f32; 4],
    recreations: u64,
}

impl<B: RenderBackend, W: WindowProvider> FrameCycle<B, W> {
    pub fn new(backend: B, window: W, config: &EngineConfig) -> Self {
        let images_in_flight = vec![None; backend.image_count()];
        Self {
            backend,
            window,
            phase: FramePhase::Idle,
            slot: 0,
            image: None,
            images_in_flight,
            fence_timeout_ns: config.fence_timeout_ns(),
            clear_colour: config.clear_colour,
            recreations: 0,
        }
    }

    /// Wait for the current slot, acquire an image and begin recording.
    pub fn begin_frame(&mut self) -> Result<BeginFrame> {
        if self.phase != FramePhase::Idle {
            return Err(RenderError::FrameAlreadyInProgress);
        }

        if self.backend.wait_for_slot(self.slot, self.fence_timeout_ns)? == FenceWait::TimedOut {
            tracing::warn!("Frame slot {} fence wait timed out", self.slot);
            return Ok(BeginFrame::Stalled);
        }

        let image = match self.image {
            Some(image) => image,
            None => match self.backend.acquire_next_image(self.slot, self.fence_timeout_ns) {
                Ok(AcquireOutcome::Acquired { index, suboptimal }) => {
                    if suboptimal {
                        tracing::debug!("Acquired image {index} from a suboptimal swapchain");
                    }
                    self.image = Some(index);
                    index
                }
                Ok(AcquireOutcome::NotReady) => {
                    tracing::warn!("No swapchain image available for slot {}", self.slot);
                    return Ok(BeginFrame::Stalled);
                }
                Ok(AcquireOutcome::OutOfDate) => {
                    return Ok(if self.recreate()? {
                        BeginFrame::Recreated
                    } else {
                        BeginFrame::Closing
                    });
                }
                Err(GpuError::Vulkan(code)) => return Err(RenderError::SurfaceAcquire(code)),
                Err(e) => return Err(e.into()),
            },
        };

        let entry = image as usize;
        if entry >= self.images_in_flight.len() {
            self.images_in_flight.resize(entry + 1, None);
        }
        if let Some(owner) = self.images_in_flight[entry] {
            if owner != self.slot
                && self.backend.wait_for_slot(owner, self.fence_timeout_ns)? == FenceWait::TimedOut
            {
                tracing::warn!("Image {image} still in use by slot {owner}");
                return Ok(BeginFrame::Stalled);
            }
        }
        self.images_in_flight[entry] = Some(self.slot);

        let cmd = self.backend.begin_command_buffer(self.slot)?;
        self.phase = FramePhase::FrameStarted;
        Ok(BeginFrame::Ready(cmd))
    }

    /// Begin the render pass with a full-window viewport and scissor.
    pub fn begin_renderpass(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        if self.phase != FramePhase::FrameStarted {
            return Err(RenderError::NoFrameInProgress);
        }
        self.check_command_buffer(cmd)?;
        let image = self.image.ok_or(RenderError::NoFrameInProgress)?;

        self.backend.cmd_begin_renderpass(cmd, image, self.clear_colour);
        let extent = self.backend.extent();
        self.backend.cmd_set_viewport_scissor(cmd, extent);
        self.phase = FramePhase::RenderpassActive;
        Ok(())
    }

    pub fn end_renderpass(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        if self.phase != FramePhase::RenderpassActive {
            return Err(RenderError::NoFrameInProgress);
        }
        self.check_command_buffer(cmd)?;

        self.backend.cmd_end_renderpass(cmd);
        self.phase = FramePhase::FrameStarted;
        Ok(())
    }

    /// Submit and present, then advance to the next slot.
    ///
    /// A suboptimal or out-of-date present, or a pending resize, rebuilds
    /// the swapchain before returning.
    pub fn end_frame(&mut self) -> Result<EndFrame> {
        match self.phase {
            FramePhase::Idle => return Err(RenderError::NoFrameInProgress),
            FramePhase::RenderpassActive => return Err(RenderError::RenderpassStillActive),
            FramePhase::FrameStarted => {}
        }
        let image = self.image.take().ok_or(RenderError::NoFrameInProgress)?;
        let cmd = self.backend.command_buffer(self.slot);
        self.phase = FramePhase::Idle;

        self.backend.end_command_buffer(cmd)?;
        self.backend.submit(self.slot, cmd)?;
        let outcome = self.backend.present(self.slot, image)?;
        self.slot = (self.slot + 1) % self.backend.frames_in_flight().max(1);

        if outcome.needs_recreation() || self.window.was_resized() {
            return Ok(if self.recreate()? {
                EndFrame::Recreated
            } else {
                EndFrame::Closing
            });
        }
        Ok(EndFrame::Presented)
    }

    /// Rebuild the swapchain once the window has a non-zero extent.
    ///
    /// Returns `false` without touching the swapchain when the window closes
    /// while minimized.
    pub fn recreate(&mut self) -> Result<bool> {
        let (width, height) = loop {
            let (width, height) = self.window.extent();
            if width > 0 && height > 0 {
                break (width, height);
            }
            if self.window.should_close() {
                tracing::info!("Window closing, swapchain recreation abandoned");
                return Ok(false);
            }
            self.window.wait_events(EXTENT_POLL);
        };
        // A resize arriving from here on triggers another rebuild
        self.window.reset_resized();

        self.backend.wait_idle()?;
        self.backend.recreate_swapchain(width, height)?;

        self.images_in_flight = vec![None; self.backend.image_count()];
        self.image = None;
        self.recreations += 1;

        tracing::info!("Swapchain recreated at {width}x{height}");
        Ok(true)
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Index of the sync slot the next frame uses.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Swapchain recreations so far.
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    fn check_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        if cmd == self.backend.command_buffer(self.slot) {
            Ok(())
        } else {
            Err(RenderError::WrongFrameCommandBuffer)
        }
    }
}
