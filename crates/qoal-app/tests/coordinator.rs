use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec4};
use qoal_app::{CoordinatorError, GateError, RenderCoordinator, RenderThreadState};
use qoal_core::{EngineConfig, MeshHandle, VertexLayout};
use qoal_entity::{Entity, Mesh2D, Scene};
use qoal_gpu::{FenceWait, GpuError};
use qoal_platform::WindowState;
use qoal_render::{RenderError, RendererAssignments, RendererKind, Vertex2D, Vertex3D};
use qoal_test::{Recording, RecordingBackend};

fn config() -> EngineConfig {
    EngineConfig::default().with_gate_timeout(Duration::from_secs(5))
}

fn spawn(
    config: EngineConfig,
    window: &Arc<WindowState>,
    backend: RecordingBackend,
) -> RenderCoordinator {
    RenderCoordinator::spawn(config, Arc::clone(window), move |_, _| Ok(backend)).unwrap()
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn triangle(scale: f32) -> Vec<Vertex2D> {
    let v = |x: f32, y: f32, colour: Vec4| Vertex2D::new(Vec2::new(x, y) * scale, colour, Vec2::ZERO);
    vec![
        v(0.5, 0.5, Vec4::new(1.0, 0.0, 0.0, 1.0)),
        v(-0.5, 0.5, Vec4::new(0.0, 1.0, 0.0, 1.0)),
        v(0.0, -0.5, Vec4::new(0.0, 0.0, 1.0, 1.0)),
    ]
}

fn add_triangle(coordinator: &RenderCoordinator, scene: &mut Scene, scale: f32) -> (Entity, MeshHandle) {
    let handle = coordinator.create_mesh_2d(triangle(scale), None).unwrap();
    let entity = scene.add_entity();
    scene.add_component(entity, Mesh2D(handle)).unwrap();
    (entity, handle)
}

/// Draw counts of every submitted frame that drew anything.
fn drawing_frames(recording: &Recording) -> Vec<usize> {
    (0..recording.submits)
        .map(|frame| recording.draws_in_frame(frame).len())
        .filter(|&draws| draws > 0)
        .collect()
}

#[test]
fn two_published_triangles_draw_twice_per_frame() {
    let window = Arc::new(WindowState::new(800, 600));
    let backend = RecordingBackend::new();
    let recording = backend.recording();
    let coordinator = spawn(config(), &window, backend);

    let mut scene = Scene::new();
    {
        let _paused = coordinator.pause().unwrap();
        assert_eq!(coordinator.thread_state(), RenderThreadState::WaitingForGate);

        let (a, _) = add_triangle(&coordinator, &mut scene, 1.0);
        let (b, _) = add_triangle(&coordinator, &mut scene, 0.4);
        let mut staged = RendererAssignments::new();
        staged.add_entity_to_renderer(RendererKind::Triangle2D, a);
        staged.add_entity_to_renderer(RendererKind::Triangle2D, b);
        coordinator.publish_assignments(&staged, &scene).unwrap();
    }

    wait_until("two drawing frames", || drawing_frames(&recording.lock()).len() >= 2);
    window.request_close();
    let stats = coordinator.join().unwrap();

    let state = recording.lock();
    let frames = drawing_frames(&state);
    assert!(frames.iter().all(|&draws| draws == 2), "partial frame in {frames:?}");
    assert!(state.draws.iter().all(|d| d.vertex_count == 3));
    assert_eq!(stats.draw_calls, state.draws.len() as u64);
    assert_eq!(stats.frames_presented, state.presents as u64);
    assert_eq!(state.dropped_with, Some((0, 0)));
    assert_eq!(state.buffers_destroyed, 2);
}

#[test]
fn only_latest_snapshot_is_applied() {
    let window = Arc::new(WindowState::new(800, 600));
    let backend = RecordingBackend::new();
    let recording = backend.recording();
    let coordinator = spawn(config(), &window, backend);

    let mut scene = Scene::new();
    {
        let _paused = coordinator.pause().unwrap();
        let (a, _) = add_triangle(&coordinator, &mut scene, 1.0);
        let (b, _) = add_triangle(&coordinator, &mut scene, 0.5);
        let (c, _) = add_triangle(&coordinator, &mut scene, 0.2);

        let mut first = RendererAssignments::new();
        first.add_entity_to_renderer(RendererKind::Triangle2D, a);
        first.add_entity_to_renderer(RendererKind::Line2D, a);
        coordinator.publish_assignments(&first, &scene).unwrap();

        let mut second = RendererAssignments::new();
        for entity in [a, b, c] {
            second.add_entity_to_renderer(RendererKind::Triangle2D, entity);
        }
        coordinator.publish_assignments(&second, &scene).unwrap();
    }

    wait_until("a drawing frame", || !drawing_frames(&recording.lock()).is_empty());
    coordinator.request_stop();
    coordinator.join().unwrap();

    let state = recording.lock();
    assert_eq!(state.pipelines_created, vec![RendererKind::Triangle2D]);
    assert!(drawing_frames(&state).iter().all(|&draws| draws == 3));
}

#[test]
fn invalid_mesh_is_rejected_on_the_producer_side() {
    let window = Arc::new(WindowState::new(800, 600));
    let coordinator = spawn(config(), &window, RecordingBackend::new());

    let err = coordinator
        .create_mesh_2d(triangle(1.0)[..2].to_vec(), None)
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Render(RenderError::TooFewVertices { len: 2, min: 3 })
    ));
    let err = coordinator
        .create_mesh_3d(vec![Vertex3D::default(); 3], Some(vec![0, 1, 3]))
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Render(RenderError::IndexOutOfRange { index: 3, len: 3 })
    ));
    let handle = coordinator
        .create_mesh_3d(vec![Vertex3D::default(); 3], None)
        .unwrap();
    assert_eq!(handle.layout(), VertexLayout::Layout3D);
    coordinator.request_stop();
    coordinator.join().unwrap();
}

#[test]
fn init_failure_is_returned_from_spawn() {
    let window = Arc::new(WindowState::new(800, 600));
    let result = RenderCoordinator::spawn(config(), window, |_, _| {
        Err::<RecordingBackend, _>(RenderError::Gpu(GpuError::NoSuitableDevice))
    });

    assert!(matches!(
        result,
        Err(CoordinatorError::Render(RenderError::Gpu(GpuError::NoSuitableDevice)))
    ));
}

#[test]
fn consecutive_stalls_abort_the_render_thread() {
    let window = Arc::new(WindowState::new(800, 600));
    let backend = RecordingBackend::new();
    backend
        .state()
        .wait_script
        .extend([FenceWait::TimedOut; 8]);
    let recording = backend.recording();
    let coordinator = spawn(config().with_max_stalled_frames(3), &window, backend);

    wait_until("render thread exit", || coordinator.is_finished());
    assert!(matches!(coordinator.join(), Err(CoordinatorError::Stalled(3))));

    let state = recording.lock();
    assert_eq!(state.submits, 0);
    assert_eq!(state.dropped_with, Some((0, 0)));
}

#[test]
fn pause_times_out_while_minimized_then_recovers() {
    let window = Arc::new(WindowState::new(800, 600));
    let backend = RecordingBackend::new();
    let recording = backend.recording();
    let timeout = Duration::from_millis(200);
    let coordinator = spawn(config().with_gate_timeout(timeout), &window, backend);

    wait_until("a presented frame", || recording.lock().presents > 0);
    window.notify_resized(0, 0);
    thread::sleep(Duration::from_millis(100));

    assert!(matches!(
        coordinator.pause(),
        Err(CoordinatorError::Gate(GateError::Timeout(t))) if t == timeout
    ));

    window.notify_resized(640, 480);
    wait_until("recreation", || recording.lock().recreations == 1);
    drop(coordinator.pause().unwrap());

    window.request_close();
    let stats = coordinator.join().unwrap();
    assert_eq!(stats.recreations, 1);
    assert_eq!(recording.lock().recreated_extents, vec![(640, 480)]);
}

#[test]
fn batch_larger_than_the_channel_fits_under_one_pause() {
    let window = Arc::new(WindowState::new(800, 600));
    let backend = RecordingBackend::new();
    let recording = backend.recording();
    let capacity = 4;
    let meshes = capacity * 3;
    let coordinator = spawn(config().with_command_capacity(capacity), &window, backend);

    let mut scene = Scene::new();
    let mut staged = RendererAssignments::new();
    {
        let _paused = coordinator.pause().unwrap();
        for i in 0..meshes {
            let (entity, _) = add_triangle(&coordinator, &mut scene, 1.0 / (i + 1) as f32);
            staged.add_entity_to_renderer(RendererKind::Triangle2D, entity);
        }
        coordinator.publish_assignments(&staged, &scene).unwrap();

        // Uploads may land while paused, the snapshot may not
        assert!(drawing_frames(&recording.lock()).is_empty());
        assert!(recording.lock().pipelines_created.is_empty());
    }

    wait_until("a drawing frame", || !drawing_frames(&recording.lock()).is_empty());
    coordinator.request_stop();
    coordinator.join().unwrap();

    let state = recording.lock();
    assert_eq!(state.uploads.len(), meshes);
    assert!(drawing_frames(&state).iter().all(|&draws| draws == meshes));
}

#[test]
fn stop_request_ends_a_minimized_render_thread() {
    let window = Arc::new(WindowState::new(800, 600));
    let backend = RecordingBackend::new();
    let recording = backend.recording();
    let coordinator = spawn(config(), &window, backend);

    wait_until("a presented frame", || recording.lock().presents > 0);
    window.notify_resized(0, 0);
    thread::sleep(Duration::from_millis(100));
    coordinator.request_stop();

    let (done_tx, done_rx) = crossbeam::channel::bounded(1);
    thread::spawn(move || {
        let _ = done_tx.send(coordinator.join());
    });
    let stats = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("render thread still waiting on the minimized window")
        .unwrap();

    assert_eq!(stats.recreations, 0);
    assert_eq!(recording.lock().dropped_with, Some((0, 0)));
}
