//! The render thread and its producer-side handle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender};
use qoal_core::{EngineConfig, MeshHandle, MeshHandleAllocator};
use qoal_entity::Scene;
use qoal_platform::WindowProvider;
use qoal_render::{
    BeginFrame, EndFrame, FrameCycle, MeshData, MeshPool, RegistrySnapshot, RenderBackend,
    RendererAssignments, RendererRegistry, Vertex2D, Vertex3D,
};

use crate::command::RenderCommand;
use crate::error::{CoordinatorError, Result};
use crate::gate::{Gate, GateWait, PauseGuard, RenderThreadState};
use crate::stats::RenderStats;

/// How long the render thread parks before re-checking for close.
const GATE_POLL: Duration = Duration::from_millis(50);

/// Producer-side handle to the render thread.
///
/// Dropping the coordinator closes the gate and joins the thread.
pub struct RenderCoordinator {
    gate: Arc<Gate>,
    commands: Sender<RenderCommand>,
    handles: Arc<MeshHandleAllocator>,
    gate_timeout: Duration,
    thread: Option<JoinHandle<Result<RenderStats>>>,
}

impl RenderCoordinator {
    /// Start the render thread and wait for it to initialize.
    ///
    /// `init` runs on the render thread with the window's current extent and
    /// builds the backend. An init failure is returned here.
    pub fn spawn<B, W, F>(config: EngineConfig, window: W, init: F) -> Result<Self>
    where
        B: RenderBackend + 'static,
        W: WindowProvider + 'static,
        F: FnOnce(&EngineConfig, (u32, u32)) -> qoal_render::Result<B> + Send + 'static,
    {
        config.validate()?;

        let gate = Arc::new(Gate::new());
        let handles = Arc::new(MeshHandleAllocator::new());
        let (commands, inbox) = channel::bounded(config.command_capacity);
        let (ready_tx, ready_rx) = channel::bounded::<()>(1);
        let gate_timeout = config.gate_timeout;

        let thread = {
            let gate = Arc::clone(&gate);
            let handles = Arc::clone(&handles);
            thread::Builder::new()
                .name("qoal-render".to_string())
                .spawn(move || {
                    let extent = window.extent();
                    let backend = match init(&config, extent) {
                        Ok(backend) => backend,
                        Err(e) => {
                            tracing::error!("Render system initialization failed: {e}");
                            gate.set_thread_state(RenderThreadState::Terminated);
                            return Err(e.into());
                        }
                    };
                    let system =
                        RenderSystem::new(backend, window, Arc::clone(&gate), &config, handles);
                    gate.set_thread_state(RenderThreadState::Running);
                    // The producer may already have given up waiting
                    let _ = ready_tx.send(());
                    drop(ready_tx);

                    system.run(&gate, &inbox, config.max_stalled_frames)
                })
                .map_err(CoordinatorError::Spawn)?
        };

        let mut coordinator = Self {
            gate,
            commands,
            handles,
            gate_timeout,
            thread: Some(thread),
        };

        if ready_rx.recv().is_err() {
            // The thread exited before signalling; its result says why
            return Err(match coordinator.take_result() {
                Ok(_) => CoordinatorError::Disconnected,
                Err(e) => e,
            });
        }
        tracing::info!("Render thread running");
        Ok(coordinator)
    }

    /// Pause the render thread at its next gate check.
    ///
    /// Everything sent while the guard is held is applied together before
    /// the next frame.
    pub fn pause(&self) -> Result<PauseGuard<'_>> {
        Ok(self.gate.pause(self.gate_timeout)?)
    }

    /// Validate and queue a 2D mesh. The handle is usable immediately.
    pub fn create_mesh_2d(
        &self,
        vertices: Vec<Vertex2D>,
        indices: Option<Vec<u32>>,
    ) -> Result<MeshHandle> {
        self.create_mesh(MeshData::new_2d(vertices, indices)?)
    }

    /// Validate and queue a 3D mesh. The handle is usable immediately.
    pub fn create_mesh_3d(
        &self,
        vertices: Vec<Vertex3D>,
        indices: Option<Vec<u32>>,
    ) -> Result<MeshHandle> {
        self.create_mesh(MeshData::new_3d(vertices, indices)?)
    }

    pub fn create_mesh(&self, data: MeshData) -> Result<MeshHandle> {
        let handle = self.handles.allocate(data.layout());
        self.send(RenderCommand::UploadMesh { handle, data })?;
        Ok(handle)
    }

    /// Queue a snapshot to replace the registry contents.
    pub fn publish(&self, snapshot: RegistrySnapshot) -> Result<()> {
        tracing::debug!(
            "Publishing {} renderer kinds, {} draw items",
            snapshot.entries().len(),
            snapshot.draw_count()
        );
        self.send(RenderCommand::Publish(snapshot))
    }

    /// Resolve staged assignments against the scene and publish them.
    pub fn publish_assignments(&self, staged: &RendererAssignments, scene: &Scene) -> Result<()> {
        self.publish(staged.snapshot(scene))
    }

    /// Ask the render thread to stop after its current frame.
    pub fn request_stop(&self) {
        self.gate.close();
    }

    pub fn thread_state(&self) -> RenderThreadState {
        self.gate.thread_state()
    }

    /// Whether the render thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the render thread to exit and return its statistics.
    ///
    /// Does not ask the thread to stop; close the window or call
    /// [`request_stop`](Self::request_stop) first.
    pub fn join(mut self) -> Result<RenderStats> {
        self.take_result()
    }

    fn send(&self, command: RenderCommand) -> Result<()> {
        match self.commands.send_timeout(command, self.gate_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(CoordinatorError::ChannelFull),
            Err(SendTimeoutError::Disconnected(_)) => Err(CoordinatorError::Disconnected),
        }
    }

    fn take_result(&mut self) -> Result<RenderStats> {
        let thread = self.thread.take().ok_or(CoordinatorError::Disconnected)?;
        thread.join().map_err(|_| CoordinatorError::ThreadPanicked)?
    }
}

impl Drop for RenderCoordinator {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.gate.close();
            if let Err(e) = self.take_result() {
                tracing::error!("Render thread ended with error: {e}");
            }
        }
    }
}

enum FrameOutcome {
    Presented,
    Skipped,
    Stalled,
    Closing,
}

/// The render thread's view of the window: closing once the window closes
/// or a stop is requested through the gate.
struct StoppableWindow<W> {
    window: W,
    gate: Arc<Gate>,
}

impl<W: WindowProvider> WindowProvider for StoppableWindow<W> {
    fn extent(&self) -> (u32, u32) {
        self.window.extent()
    }

    fn was_resized(&self) -> bool {
        self.window.was_resized()
    }

    fn reset_resized(&self) {
        self.window.reset_resized();
    }

    fn should_close(&self) -> bool {
        self.window.should_close() || self.gate.is_closed()
    }

    fn wait_events(&self, timeout: Duration) {
        self.window.wait_events(timeout);
    }
}

/// Everything the render thread owns.
struct RenderSystem<B: RenderBackend, W: WindowProvider> {
    cycle: FrameCycle<B, StoppableWindow<W>>,
    pool: MeshPool,
    registry: RendererRegistry,
    /// Newest published snapshot, held until the gate reopens.
    pending: Option<RegistrySnapshot>,
    stats: RenderStats,
}

impl<B: RenderBackend, W: WindowProvider> RenderSystem<B, W> {
    fn new(
        backend: B,
        window: W,
        gate: Arc<Gate>,
        config: &EngineConfig,
        handles: Arc<MeshHandleAllocator>,
    ) -> Self {
        Self {
            cycle: FrameCycle::new(backend, StoppableWindow { window, gate }, config),
            pool: MeshPool::new(handles),
            registry: RendererRegistry::new(config.republish_policy),
            pending: None,
            stats: RenderStats::default(),
        }
    }

    fn run(
        mut self,
        gate: &Gate,
        inbox: &Receiver<RenderCommand>,
        max_stalled_frames: u32,
    ) -> Result<RenderStats> {
        let result = self.render_loop(gate, inbox, max_stalled_frames);
        gate.set_thread_state(RenderThreadState::Terminated);
        if let Err(e) = &result {
            tracing::error!("Render loop aborted: {e}");
        }
        let stats = self.shutdown();
        result.map(|()| stats)
    }

    fn render_loop(
        &mut self,
        gate: &Gate,
        inbox: &Receiver<RenderCommand>,
        max_stalled_frames: u32,
    ) -> Result<()> {
        let mut stalled = 0;
        loop {
            if self.cycle.window().window.should_close() {
                tracing::info!("Window closed, leaving render loop");
                return Ok(());
            }
            match gate.park(GATE_POLL) {
                GateWait::Open => {}
                GateWait::StillPaused => {
                    // Keep the channel moving so a large batch cannot fill it
                    self.drain_commands(inbox)?;
                    continue;
                }
                GateWait::Closed => {
                    tracing::info!("Stop requested, leaving render loop");
                    return Ok(());
                }
            }
            gate.set_thread_state(RenderThreadState::Drawing);

            self.apply_commands(inbox)?;

            match self.frame()? {
                FrameOutcome::Presented => stalled = 0,
                FrameOutcome::Skipped => {}
                FrameOutcome::Stalled => {
                    stalled += 1;
                    if stalled >= max_stalled_frames {
                        return Err(CoordinatorError::Stalled(stalled));
                    }
                }
                FrameOutcome::Closing => return Ok(()),
            }
        }
    }

    /// Apply queued uploads in order. Snapshots are held back; only the
    /// newest is kept.
    fn drain_commands(&mut self, inbox: &Receiver<RenderCommand>) -> Result<()> {
        for command in inbox.try_iter() {
            match command {
                RenderCommand::UploadMesh { handle, data } => {
                    self.pool.insert(self.cycle.backend_mut(), handle, &data)?;
                }
                RenderCommand::Publish(snapshot) => {
                    if self.pending.replace(snapshot).is_some() {
                        tracing::debug!("Snapshot superseded before it was applied");
                    }
                }
            }
        }
        Ok(())
    }

    /// Drain the channel, then apply the newest snapshot as a whole.
    fn apply_commands(&mut self, inbox: &Receiver<RenderCommand>) -> Result<()> {
        self.drain_commands(inbox)?;
        if let Some(snapshot) = self.pending.take() {
            self.registry.apply(&snapshot, self.cycle.backend_mut())?;
        }
        Ok(())
    }

    fn frame(&mut self) -> Result<FrameOutcome> {
        let cmd = match self.cycle.begin_frame()? {
            BeginFrame::Ready(cmd) => cmd,
            BeginFrame::Recreated => {
                self.stats.frames_skipped += 1;
                return Ok(FrameOutcome::Skipped);
            }
            BeginFrame::Stalled => {
                self.stats.frames_skipped += 1;
                return Ok(FrameOutcome::Stalled);
            }
            BeginFrame::Closing => return Ok(FrameOutcome::Closing),
        };

        self.cycle.begin_renderpass(cmd)?;
        let draws = self.registry.record(self.cycle.backend_mut(), cmd, &self.pool);
        self.cycle.end_renderpass(cmd)?;
        let end = self.cycle.end_frame()?;

        self.stats.frames_presented += 1;
        self.stats.draw_calls += u64::from(draws);
        Ok(match end {
            EndFrame::Presented | EndFrame::Recreated => FrameOutcome::Presented,
            EndFrame::Closing => FrameOutcome::Closing,
        })
    }

    /// Release GPU objects in reverse construction order.
    fn shutdown(mut self) -> RenderStats {
        let backend = self.cycle.backend_mut();
        if let Err(e) = backend.wait_idle() {
            tracing::error!("Failed to wait for device idle: {e}");
        }
        self.registry.destroy(backend);
        self.pool.destroy_all(backend);

        self.stats.recreations = self.cycle.recreations();
        drop(self.cycle);

        self.stats.log();
        self.stats
    }
}
