/// Counters kept by the render thread and returned from
/// [`RenderCoordinator::join`](crate::RenderCoordinator::join).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_presented: u64,
    /// Iterations that produced no frame: stalls and out-of-date acquires.
    pub frames_skipped: u64,
    pub recreations: u64,
    pub draw_calls: u64,
}

impl RenderStats {
    pub(crate) fn log(&self) {
        tracing::info!("Render statistics:");
        tracing::info!("  Frames presented: {}", self.frames_presented);
        tracing::info!("  Frames skipped: {}", self.frames_skipped);
        tracing::info!("  Swapchain recreations: {}", self.recreations);
        tracing::info!("  Draw calls: {}", self.draw_calls);
    }
}
