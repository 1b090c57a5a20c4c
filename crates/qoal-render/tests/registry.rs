use std::sync::Arc;

use ash::vk;
use glam::{Vec2, Vec4};
use qoal_core::{EngineConfig, MeshHandle, MeshHandleAllocator, RepublishPolicy};
use qoal_entity::{Entity, Mesh2D, Mesh3D, Scene};
use qoal_render::{
    BeginFrame, FrameCycle, MeshData, MeshPool, MeshSource, RegistrySnapshot, RenderError,
    RendererAssignments, RendererKind, RendererRegistry, Vertex2D, Vertex3D,
};
use qoal_test::{RecordingBackend, ScriptedWindow};

type Cycle = FrameCycle<RecordingBackend, Arc<ScriptedWindow>>;

fn cycle() -> Cycle {
    FrameCycle::new(
        RecordingBackend::new(),
        Arc::new(ScriptedWindow::new(800, 600)),
        &EngineConfig::default(),
    )
}

fn triangle(scale: f32) -> MeshData {
    let v = |x: f32, y: f32, colour: Vec4| Vertex2D::new(Vec2::new(x, y) * scale, colour, Vec2::ZERO);
    MeshData::new_2d(
        vec![
            v(0.5, 0.5, Vec4::new(1.0, 0.0, 0.0, 1.0)),
            v(-0.5, 0.5, Vec4::new(0.0, 1.0, 0.0, 1.0)),
            v(0.0, -0.5, Vec4::new(0.0, 0.0, 1.0, 1.0)),
        ],
        None,
    )
    .unwrap()
}

struct Fixture {
    cycle: Cycle,
    pool: MeshPool,
    scene: Scene,
    registry: RendererRegistry,
}

impl Fixture {
    fn new(policy: RepublishPolicy) -> Self {
        Self {
            cycle: cycle(),
            pool: MeshPool::new(Arc::new(MeshHandleAllocator::new())),
            scene: Scene::new(),
            registry: RendererRegistry::new(policy),
        }
    }

    fn entity_with_mesh(&mut self, data: &MeshData) -> (Entity, MeshHandle) {
        let handle = self.pool.create_mesh(self.cycle.backend_mut(), data).unwrap();
        let entity = self.scene.add_entity();
        self.scene.add_component(entity, Mesh2D(handle)).unwrap();
        (entity, handle)
    }

    fn publish(&mut self, kind: RendererKind, entities: &[Entity]) {
        let mut staged = RendererAssignments::new();
        for &entity in entities {
            staged.add_entity_to_renderer(kind, entity);
        }
        let snapshot = staged.snapshot(&self.scene);
        self.registry
            .apply(&snapshot, self.cycle.backend_mut())
            .unwrap();
    }

    /// One frame; returns the draw count the registry reported.
    fn frame(&mut self) -> u32 {
        let BeginFrame::Ready(cmd) = self.cycle.begin_frame().unwrap() else {
            panic!("frame did not start");
        };
        self.cycle.begin_renderpass(cmd).unwrap();
        let draws = self.registry.record(self.cycle.backend_mut(), cmd, &self.pool);
        self.cycle.end_renderpass(cmd).unwrap();
        self.cycle.end_frame().unwrap();
        draws
    }

    fn entities_of(&self, kind: RendererKind) -> Vec<Entity> {
        self.registry
            .renderer(kind)
            .map(|r| r.items().iter().map(|item| item.entity).collect())
            .unwrap_or_default()
    }
}

#[test]
fn two_triangles_draw_twice_with_three_vertices() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let (a, mesh_a) = fx.entity_with_mesh(&triangle(1.0));
    let (b, mesh_b) = fx.entity_with_mesh(&triangle(0.4));
    fx.publish(RendererKind::Triangle2D, &[a, b]);

    assert_eq!(fx.frame(), 2);

    let state = fx.cycle.backend().state();
    let draws = state.draws_in_frame(0);
    assert_eq!(draws.len(), 2);
    assert!(draws.iter().all(|d| d.vertex_count == 3));
    assert_eq!(draws[0].buffer, fx.pool.vertex_buffer(mesh_a).unwrap());
    assert_eq!(draws[1].buffer, fx.pool.vertex_buffer(mesh_b).unwrap());
    assert_eq!(state.pipeline_kind(draws[0].pipeline), Some(RendererKind::Triangle2D));
    assert_eq!(state.pipeline_binds, 1);
}

#[test]
fn instance_count_matches_vertex_count() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let data = MeshData::new_3d(vec![Vertex3D::default(); 5], Some(vec![0, 1, 2, 2, 3, 4])).unwrap();
    let handle = fx.pool.create_mesh(fx.cycle.backend_mut(), &data).unwrap();

    assert_eq!(fx.pool.instance_count(handle), Some(5));
    assert!(fx.pool.index_buffer(handle).is_some());

    let state = fx.cycle.backend().state();
    assert_eq!(state.uploads.len(), 2);
    assert_eq!(state.uploads[0].usage, vk::BufferUsageFlags::VERTEX_BUFFER);
    assert_eq!(state.uploads[0].size, 5 * 48);
    assert_eq!(state.uploads[1].usage, vk::BufferUsageFlags::INDEX_BUFFER);
}

#[test]
fn handle_of_other_layout_is_unknown() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let handle = fx.pool.create_mesh(fx.cycle.backend_mut(), &triangle(1.0)).unwrap();
    let as_3d = MeshHandle::new(handle.index(), qoal_core::VertexLayout::Layout3D);

    assert!(fx.pool.contains(handle));
    assert!(!fx.pool.contains(as_3d));
    assert_eq!(fx.pool.instance_count(as_3d), None);
}

#[test]
fn replace_policy_takes_newest_list() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let (a, _) = fx.entity_with_mesh(&triangle(1.0));
    let (b, _) = fx.entity_with_mesh(&triangle(0.5));

    fx.publish(RendererKind::Triangle2D, &[a]);
    fx.publish(RendererKind::Triangle2D, &[b]);

    assert_eq!(fx.entities_of(RendererKind::Triangle2D), vec![b]);
    assert_eq!(fx.cycle.backend().state().pipelines_created.len(), 1);
}

#[test]
fn append_policy_extends() {
    let mut fx = Fixture::new(RepublishPolicy::Append);
    let (a, _) = fx.entity_with_mesh(&triangle(1.0));
    let (b, _) = fx.entity_with_mesh(&triangle(0.5));

    fx.publish(RendererKind::Triangle2D, &[a]);
    fx.publish(RendererKind::Triangle2D, &[b]);

    assert_eq!(fx.entities_of(RendererKind::Triangle2D), vec![a, b]);
    assert_eq!(fx.frame(), 2);
}

#[test]
fn keep_policy_ignores_republication() {
    let mut fx = Fixture::new(RepublishPolicy::Keep);
    let (a, _) = fx.entity_with_mesh(&triangle(1.0));
    let (b, _) = fx.entity_with_mesh(&triangle(0.5));

    fx.publish(RendererKind::Triangle2D, &[a]);
    fx.publish(RendererKind::Triangle2D, &[a, b]);

    assert_eq!(fx.entities_of(RendererKind::Triangle2D), vec![a]);
}

#[test]
fn kinds_absent_from_snapshot_keep_their_lists() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let (a, _) = fx.entity_with_mesh(&triangle(1.0));
    let (b, _) = fx.entity_with_mesh(&triangle(0.5));

    fx.publish(RendererKind::Triangle2D, &[a]);
    fx.publish(RendererKind::Line2D, &[b]);

    assert_eq!(fx.entities_of(RendererKind::Triangle2D), vec![a]);
    assert_eq!(fx.entities_of(RendererKind::Line2D), vec![b]);
    assert_eq!(fx.registry.len(), 2);
}

#[test]
fn failed_pipeline_leaves_registry_untouched() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let (a, _) = fx.entity_with_mesh(&triangle(1.0));
    let (b, _) = fx.entity_with_mesh(&triangle(0.5));
    fx.publish(RendererKind::Triangle2D, &[a]);
    fx.cycle
        .backend()
        .state()
        .failing_pipelines
        .push(RendererKind::Line2D);

    let mut staged = RendererAssignments::new();
    staged.add_entity_to_renderer(RendererKind::Triangle2D, b);
    staged.add_entity_to_renderer(RendererKind::Line2D, b);
    let err = fx
        .registry
        .apply(&staged.snapshot(&fx.scene), fx.cycle.backend_mut())
        .unwrap_err();

    assert!(matches!(err, RenderError::Gpu(_)));
    assert_eq!(fx.entities_of(RendererKind::Triangle2D), vec![a]);
    assert!(fx.registry.renderer(RendererKind::Line2D).is_none());
    assert_eq!(fx.cycle.backend().state().live_pipelines.len(), 1);
}

#[test]
fn partial_pipeline_creation_is_rolled_back() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let (a, _) = fx.entity_with_mesh(&triangle(1.0));
    fx.cycle
        .backend()
        .state()
        .failing_pipelines
        .push(RendererKind::Line2D);

    let mut staged = RendererAssignments::new();
    staged.add_entity_to_renderer(RendererKind::Triangle2D, a);
    staged.add_entity_to_renderer(RendererKind::Line2D, a);
    assert!(fx
        .registry
        .apply(&staged.snapshot(&fx.scene), fx.cycle.backend_mut())
        .is_err());

    assert!(fx.registry.is_empty());
    let state = fx.cycle.backend().state();
    assert_eq!(state.pipelines_created, vec![RendererKind::Triangle2D]);
    assert_eq!(state.pipelines_destroyed, 1);
    assert!(state.live_pipelines.is_empty());
}

#[test]
fn missing_mesh_is_skipped_at_draw_time() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let (a, _) = fx.entity_with_mesh(&triangle(1.0));
    let ghost = fx.scene.add_entity();
    let never_uploaded = MeshHandle::new(99, qoal_core::VertexLayout::Layout2D);
    fx.scene.add_component(ghost, Mesh2D(never_uploaded)).unwrap();
    fx.publish(RendererKind::Triangle2D, &[a, ghost]);

    assert_eq!(fx.frame(), 1);
}

#[test]
fn three_d_mesh_is_not_drawn_by_2d_renderer() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let data = MeshData::new_3d(vec![Vertex3D::default(); 3], None).unwrap();
    let handle = fx.pool.create_mesh(fx.cycle.backend_mut(), &data).unwrap();
    let entity = fx.scene.add_entity();
    fx.scene.add_component(entity, Mesh3D(handle)).unwrap();

    fx.publish(RendererKind::Triangle2D, &[entity]);
    fx.publish(RendererKind::Triangle3D, &[entity]);

    assert!(fx.entities_of(RendererKind::Triangle2D).is_empty());
    assert_eq!(fx.entities_of(RendererKind::Triangle3D), vec![entity]);
}

#[test]
fn teardown_releases_everything_before_backend_drop() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    let (a, _) = fx.entity_with_mesh(&triangle(1.0));
    fx.publish(RendererKind::Triangle2D, &[a]);
    fx.frame();

    let recording = fx.cycle.backend().recording();
    fx.registry.destroy(fx.cycle.backend_mut());
    fx.pool.destroy_all(fx.cycle.backend_mut());
    drop(fx);

    let state = recording.lock();
    assert_eq!(state.dropped_with, Some((0, 0)));
    assert_eq!(state.buffers_destroyed, 1);
}

#[test]
fn empty_snapshot_changes_nothing() {
    let mut fx = Fixture::new(RepublishPolicy::Replace);
    fx.registry
        .apply(&RegistrySnapshot::default(), fx.cycle.backend_mut())
        .unwrap();
    assert!(fx.registry.is_empty());
    assert_eq!(fx.frame(), 0);
}
