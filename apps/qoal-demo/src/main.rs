//! Qoal Engine demo
//!
//! Opens a window and draws two coloured triangles from the render thread.
//! The main thread owns the event loop and acts as the producer: it builds the
//! meshes and the scene while the render thread is paused, then publishes them.
//!
//! ## Usage
//!
//! ```bash
//! shaders/compile.sh
//! cargo run -p qoal-demo
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)
//! - `QOAL_SHADER_DIR`: Directory holding the compiled SPIR-V (default: `shaders/spirv`)

use std::sync::Arc;

use glam::{Vec2, Vec4};
use qoal_app::{vulkan_init, RenderCoordinator};
use qoal_core::EngineConfig;
use qoal_entity::{Mesh2D, Scene, Transform2D};
use qoal_platform::{raw_handles, window_attributes, WindowState};
use qoal_render::{RendererAssignments, RendererKind, Vertex2D};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const WIDTH: u32 = 1900;
const HEIGHT: u32 = 1000;

fn main() -> anyhow::Result<()> {
    qoal_core::logging::init()?;

    let mut config = EngineConfig::new("Qoal Engine").with_size(WIDTH, HEIGHT);
    if let Some(dir) = std::env::var_os("QOAL_SHADER_DIR") {
        config = config.with_shader_dir(dir);
    }
    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    // The render thread draws on its own; the event loop only forwards events
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut demo = Demo {
        config,
        state: None,
    };
    event_loop.run_app(&mut demo)?;
    Ok(())
}

struct Demo {
    config: EngineConfig,
    state: Option<DemoState>,
}

// Field order matters: the coordinator joins the render thread before the
// window its surface was created from is dropped.
struct DemoState {
    coordinator: Option<RenderCoordinator>,
    window_state: Arc<WindowState>,
    _scene: Scene,
    _window: Arc<Window>,
}

impl ApplicationHandler for Demo {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Demo ready");
            }
            Err(e) => {
                error!("Failed to initialize demo: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                state.shutdown();
                self.state = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.window_state.notify_resized(size.width, size.height);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // The render thread may have aborted on its own
        if let Some(state) = &mut self.state {
            if state.coordinator.as_ref().is_some_and(RenderCoordinator::is_finished) {
                error!("Render thread exited unexpectedly");
                state.shutdown();
                self.state = None;
                event_loop.exit();
            }
        }
    }
}

impl Demo {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<DemoState> {
        let window = Arc::new(event_loop.create_window(window_attributes(&self.config))?);
        let (display_handle, _) = raw_handles(&window)?;
        info!("Window created on {display_handle:?}");
        let window_state = Arc::new(WindowState::from_window(&window));

        let coordinator = RenderCoordinator::spawn(
            self.config.clone(),
            Arc::clone(&window_state),
            vulkan_init(Arc::clone(&window)),
        )?;

        let mut scene = Scene::new();
        publish_triangles(&coordinator, &mut scene)?;

        Ok(DemoState {
            coordinator: Some(coordinator),
            window_state,
            _scene: scene,
            _window: window,
        })
    }
}

impl DemoState {
    fn shutdown(&mut self) {
        self.window_state.request_close();
        if let Some(coordinator) = self.coordinator.take() {
            match coordinator.join() {
                Ok(stats) => info!(
                    "Render thread finished after {} frames",
                    stats.frames_presented
                ),
                Err(e) => error!("Render thread failed: {e}"),
            }
        }
    }
}

/// Build two triangle entities and hand them to the 2D triangle renderer.
fn publish_triangles(coordinator: &RenderCoordinator, scene: &mut Scene) -> anyhow::Result<()> {
    let outer = [
        (Vec2::new(0.5, 0.5), Vec4::new(1.0, 0.0, 0.0, 1.0)),
        (Vec2::new(-0.5, 0.5), Vec4::new(0.0, 1.0, 0.0, 1.0)),
        (Vec2::new(0.0, -0.5), Vec4::new(0.0, 0.0, 1.0, 1.0)),
    ];
    let inner = [
        (Vec2::new(0.2, 0.2), Vec4::new(1.0, 1.0, 0.0, 1.0)),
        (Vec2::new(-0.2, 0.2), Vec4::new(0.0, 1.0, 1.0, 1.0)),
        (Vec2::new(0.0, -0.2), Vec4::new(1.0, 0.0, 1.0, 1.0)),
    ];

    let _paused = coordinator.pause()?;
    let mut staged = RendererAssignments::new();
    for corners in [outer, inner] {
        let vertices = corners
            .iter()
            .map(|&(position, colour)| Vertex2D::new(position, colour, Vec2::ZERO))
            .collect();
        let mesh = coordinator.create_mesh_2d(vertices, None)?;

        let entity = scene.add_entity();
        scene.add_component(entity, Transform2D::default())?;
        scene.add_component(entity, Mesh2D(mesh))?;
        staged.add_entity_to_renderer(RendererKind::Triangle2D, entity);
    }
    coordinator.publish_assignments(&staged, scene)?;
    info!("Published {} triangles", staged.entities(RendererKind::Triangle2D).len());
    Ok(())
}
