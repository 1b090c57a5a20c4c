use std::sync::Arc;

use ash::vk::{self, Handle};
use qoal_core::constants::{CLEAR_COLOUR, MAX_FRAMES_IN_FLIGHT};
use qoal_core::EngineConfig;
use qoal_gpu::FenceWait;
use qoal_platform::WindowProvider;
use qoal_render::{
    AcquireOutcome, BeginFrame, EndFrame, FrameCycle, FramePhase, PresentOutcome, RenderBackend,
    RenderError,
};
use qoal_test::{RecordingBackend, ScriptedWindow};

type Cycle = FrameCycle<RecordingBackend, Arc<ScriptedWindow>>;

fn cycle_with(backend: RecordingBackend) -> (Cycle, Arc<ScriptedWindow>) {
    let window = Arc::new(ScriptedWindow::new(800, 600));
    let cycle = FrameCycle::new(backend, Arc::clone(&window), &EngineConfig::default());
    (cycle, window)
}

fn cycle() -> (Cycle, Arc<ScriptedWindow>) {
    cycle_with(RecordingBackend::new())
}

fn begin(cycle: &mut Cycle) -> vk::CommandBuffer {
    match cycle.begin_frame().unwrap() {
        BeginFrame::Ready(cmd) => cmd,
        other => panic!("expected a frame, got {other:?}"),
    }
}

fn run_frame(cycle: &mut Cycle) -> EndFrame {
    let cmd = begin(cycle);
    cycle.begin_renderpass(cmd).unwrap();
    cycle.end_renderpass(cmd).unwrap();
    cycle.end_frame().unwrap()
}

#[test]
fn renderpass_calls_fail_outside_a_frame() {
    let (mut cycle, _window) = cycle();
    let cmd = cycle.backend().command_buffer(0);

    assert!(matches!(cycle.begin_renderpass(cmd), Err(RenderError::NoFrameInProgress)));
    assert!(matches!(cycle.end_renderpass(cmd), Err(RenderError::NoFrameInProgress)));
    assert!(matches!(cycle.end_frame(), Err(RenderError::NoFrameInProgress)));

    let cmd = begin(&mut cycle);
    assert!(matches!(cycle.end_renderpass(cmd), Err(RenderError::NoFrameInProgress)));
    cycle.begin_renderpass(cmd).unwrap();
    cycle.end_renderpass(cmd).unwrap();
    cycle.end_frame().unwrap();

    assert!(matches!(cycle.begin_renderpass(cmd), Err(RenderError::NoFrameInProgress)));
    assert_eq!(cycle.phase(), FramePhase::Idle);
}

#[test]
fn second_begin_is_rejected() {
    let (mut cycle, _window) = cycle();
    begin(&mut cycle);
    assert!(matches!(cycle.begin_frame(), Err(RenderError::FrameAlreadyInProgress)));
}

#[test]
fn foreign_command_buffer_is_rejected() {
    let (mut cycle, _window) = cycle();
    let cmd = begin(&mut cycle);
    let foreign = vk::CommandBuffer::from_raw(0xdead);

    assert!(matches!(
        cycle.begin_renderpass(foreign),
        Err(RenderError::WrongFrameCommandBuffer)
    ));
    cycle.begin_renderpass(cmd).unwrap();
    assert!(matches!(
        cycle.end_renderpass(foreign),
        Err(RenderError::WrongFrameCommandBuffer)
    ));
    assert_eq!(cycle.phase(), FramePhase::RenderpassActive);
}

#[test]
fn end_frame_requires_renderpass_ended() {
    let (mut cycle, _window) = cycle();
    let cmd = begin(&mut cycle);
    cycle.begin_renderpass(cmd).unwrap();
    assert!(matches!(cycle.end_frame(), Err(RenderError::RenderpassStillActive)));
}

#[test]
fn frame_clears_sets_viewport_and_advances_slot() {
    let (mut cycle, _window) = cycle();

    assert_eq!(run_frame(&mut cycle), EndFrame::Presented);
    assert_eq!(cycle.slot(), 1);
    assert_eq!(run_frame(&mut cycle), EndFrame::Presented);
    assert_eq!(cycle.slot(), 0);

    let state = cycle.backend().state();
    assert_eq!(state.clear_colours, vec![CLEAR_COLOUR; 2]);
    assert_eq!(state.viewports[0], vk::Extent2D { width: 800, height: 600 });
    assert_eq!((state.submits, state.presents), (2, 2));
    assert_eq!(state.fence_waits, vec![0, 1]);
}

#[test]
fn configured_clear_colour_is_used() {
    let window = Arc::new(ScriptedWindow::new(800, 600));
    let config = EngineConfig::default().with_clear_colour([0.2, 0.4, 0.6, 1.0]);
    let mut cycle = FrameCycle::new(RecordingBackend::new(), window, &config);
    run_frame(&mut cycle);

    let backend = cycle.into_backend();
    assert_eq!(backend.state().clear_colours, vec![[0.2, 0.4, 0.6, 1.0]]);
}

#[test]
fn resize_recreates_once_and_survives_zero_extent() {
    let (mut cycle, window) = cycle();
    run_frame(&mut cycle);

    window.resize(0, 0);
    window.then_extents([(0, 0), (1024, 768)]);
    assert_eq!(run_frame(&mut cycle), EndFrame::Recreated);
    assert_eq!(window.waits(), 2);

    assert_eq!(run_frame(&mut cycle), EndFrame::Presented);
    assert_eq!(cycle.recreations(), 1);

    let state = cycle.backend().state();
    assert_eq!(state.recreations, 1);
    assert_eq!(state.recreated_extents, vec![(1024, 768)]);
    assert_eq!(state.wait_idles, 1);
    assert_eq!(state.viewports.last(), Some(&vk::Extent2D { width: 1024, height: 768 }));
}

#[test]
fn recreation_keeps_ring_and_target_counts() {
    let (mut cycle, window) = cycle_with(RecordingBackend::with_images(3, 640, 480));
    window.resize(700, 500);
    run_frame(&mut cycle);

    let state = cycle.backend().state();
    assert_eq!(state.recreations, 1);
    assert_eq!(state.ring_size, MAX_FRAMES_IN_FLIGHT);
    assert_eq!(state.live_framebuffers, 3);
    assert_eq!(state.live_image_views, 3);
}

#[test]
fn out_of_date_acquire_recreates_without_a_frame() {
    let (mut cycle, _window) = cycle();
    cycle
        .backend()
        .state()
        .acquire_script
        .push_back(Ok(AcquireOutcome::OutOfDate));

    assert_eq!(cycle.begin_frame().unwrap(), BeginFrame::Recreated);
    assert_eq!(cycle.phase(), FramePhase::Idle);
    assert_eq!(cycle.recreations(), 1);

    assert_eq!(run_frame(&mut cycle), EndFrame::Presented);
    assert_eq!(cycle.backend().state().submits, 1);
}

#[test]
fn acquire_timeout_stalls_then_retries() {
    let (mut cycle, _window) = cycle();
    cycle
        .backend()
        .state()
        .acquire_script
        .push_back(Ok(AcquireOutcome::NotReady));

    assert_eq!(cycle.begin_frame().unwrap(), BeginFrame::Stalled);
    assert_eq!(cycle.phase(), FramePhase::Idle);
    assert_eq!(run_frame(&mut cycle), EndFrame::Presented);

    let state = cycle.backend().state();
    let timeout = EngineConfig::default().fence_timeout_ns();
    assert_eq!(state.acquire_timeouts, vec![timeout, timeout]);
    assert_eq!(state.recreations, 0);
}

#[test]
fn resize_during_rebuild_triggers_another_rebuild() {
    let window = Arc::new(ScriptedWindow::new(800, 600));
    let mut backend = RecordingBackend::new();
    let resizer = Arc::clone(&window);
    let mut resized = false;
    backend.on_recreate(move |_, _| {
        if !resized {
            resized = true;
            resizer.resize(1280, 720);
        }
    });
    let mut cycle = FrameCycle::new(backend, Arc::clone(&window), &EngineConfig::default());

    window.resize(1024, 768);
    assert_eq!(run_frame(&mut cycle), EndFrame::Recreated);
    assert!(window.was_resized());

    assert_eq!(run_frame(&mut cycle), EndFrame::Recreated);
    assert_eq!(run_frame(&mut cycle), EndFrame::Presented);
    assert_eq!(
        cycle.backend().state().recreated_extents,
        vec![(1024, 768), (1280, 720)]
    );
}

#[test]
fn suboptimal_present_recreates() {
    let (mut cycle, _window) = cycle();
    cycle
        .backend()
        .state()
        .present_script
        .push_back(PresentOutcome::Suboptimal);

    assert_eq!(run_frame(&mut cycle), EndFrame::Recreated);
    assert_eq!(cycle.recreations(), 1);
}

#[test]
fn failed_acquire_is_fatal() {
    let (mut cycle, _window) = cycle();
    cycle
        .backend()
        .state()
        .acquire_script
        .push_back(Err(vk::Result::ERROR_DEVICE_LOST));

    assert!(matches!(
        cycle.begin_frame(),
        Err(RenderError::SurfaceAcquire(vk::Result::ERROR_DEVICE_LOST))
    ));
}

#[test]
fn fence_timeout_stalls_then_retries() {
    let (mut cycle, _window) = cycle();
    cycle.backend().state().wait_script.push_back(FenceWait::TimedOut);

    assert_eq!(cycle.begin_frame().unwrap(), BeginFrame::Stalled);
    assert_eq!(cycle.phase(), FramePhase::Idle);
    assert_eq!(cycle.backend().state().acquires, 0);

    assert_eq!(run_frame(&mut cycle), EndFrame::Presented);
}

#[test]
fn image_in_use_by_other_slot_is_waited_on() {
    let (mut cycle, _window) = cycle_with(RecordingBackend::with_images(1, 800, 600));
    run_frame(&mut cycle);
    run_frame(&mut cycle);

    // Second frame runs on slot 1 but reuses image 0, last used by slot 0
    assert_eq!(cycle.backend().state().fence_waits, vec![0, 1, 0]);
}

#[test]
fn stall_on_busy_image_keeps_the_acquired_image() {
    let (mut cycle, _window) = cycle_with(RecordingBackend::with_images(1, 800, 600));
    run_frame(&mut cycle);
    cycle
        .backend()
        .state()
        .wait_script
        .extend([FenceWait::Signaled, FenceWait::TimedOut]);

    assert_eq!(cycle.begin_frame().unwrap(), BeginFrame::Stalled);
    assert_eq!(run_frame(&mut cycle), EndFrame::Presented);
    assert_eq!(cycle.backend().state().acquires, 2);
}

#[test]
fn closing_while_minimized_abandons_recreation() {
    let (mut cycle, window) = cycle();
    window.resize(0, 0);
    window.close_after_script();

    assert_eq!(run_frame(&mut cycle), EndFrame::Closing);
    assert_eq!(cycle.recreations(), 0);
    assert_eq!(cycle.backend().state().recreations, 0);
}
