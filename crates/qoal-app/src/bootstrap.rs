use std::sync::Arc;

use qoal_core::EngineConfig;
use qoal_render::VulkanBackend;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Render-thread initializer that brings up Vulkan for `window`.
///
/// Pass the result to [`RenderCoordinator::spawn`](crate::RenderCoordinator::spawn).
/// Construction runs instance, debug messenger, surface, device, swapchain,
/// command pool and sync ring in that order; the coordinator then adds the
/// frame cycle, mesh pool and registry.
pub fn vulkan_init<W>(
    window: Arc<W>,
) -> impl FnOnce(&EngineConfig, (u32, u32)) -> qoal_render::Result<VulkanBackend> + Send + 'static
where
    W: HasDisplayHandle + HasWindowHandle + Send + Sync + 'static,
{
    move |config: &EngineConfig, (width, height): (u32, u32)| {
        tracing::info!("Initializing Vulkan for a {width}x{height} window");
        Ok(VulkanBackend::new(window.as_ref(), width, height, config)?)
    }
}
