//! Producer-side staging of renderer assignments.

use qoal_core::MeshHandle;
use qoal_entity::{Entity, Mesh2D, Mesh3D, Scene};

use crate::kind::RendererKind;
use crate::snapshot::{DrawItem, RegistrySnapshot};

/// Entities staged per renderer kind, not yet visible to the render thread.
#[derive(Debug, Clone, Default)]
pub struct RendererAssignments {
    staged: Vec<(RendererKind, Vec<Entity>)>,
}

impl RendererAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity to the staged list of a renderer kind.
    pub fn add_entity_to_renderer(&mut self, kind: RendererKind, entity: Entity) {
        match self.staged.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, entities)) => entities.push(entity),
            None => self.staged.push((kind, vec![entity])),
        }
    }

    /// Staged entities for a kind.
    pub fn entities(&self, kind: RendererKind) -> &[Entity] {
        self.staged
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(&[], |(_, entities)| entities.as_slice())
    }

    pub fn clear(&mut self) {
        self.staged.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Resolve every staged entity's mesh against the scene.
    ///
    /// A 2D mesh takes priority over a 3D mesh. Entities that are gone,
    /// have no mesh, or whose mesh layout does not suit the renderer are
    /// left out with a warning.
    pub fn snapshot(&self, scene: &Scene) -> RegistrySnapshot {
        let entries = self
            .staged
            .iter()
            .map(|&(kind, ref entities)| {
                let items = entities
                    .iter()
                    .filter_map(|&entity| resolve(scene, kind, entity))
                    .collect();
                (kind, items)
            })
            .collect();
        RegistrySnapshot::new(entries)
    }
}

fn resolve(scene: &Scene, kind: RendererKind, entity: Entity) -> Option<DrawItem> {
    if !scene.contains(entity) {
        tracing::warn!("Skipping {entity:?} for {kind:?}: entity no longer exists");
        return None;
    }

    let Some(mesh) = mesh_of(scene, entity) else {
        tracing::warn!("Skipping {entity:?} for {kind:?}: no mesh component");
        return None;
    };

    if mesh.layout() != kind.layout() {
        tracing::warn!(
            "Skipping {entity:?} for {kind:?}: mesh layout {:?} does not match",
            mesh.layout()
        );
        return None;
    }

    Some(DrawItem { entity, mesh })
}

fn mesh_of(scene: &Scene, entity: Entity) -> Option<MeshHandle> {
    if let Ok(mesh) = scene.get::<Mesh2D>(entity) {
        return Some(mesh.0);
    }
    scene.get::<Mesh3D>(entity).ok().map(|mesh| mesh.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qoal_core::VertexLayout;

    fn handle_2d(index: u32) -> MeshHandle {
        MeshHandle::new(index, VertexLayout::Layout2D)
    }

    fn handle_3d(index: u32) -> MeshHandle {
        MeshHandle::new(index, VertexLayout::Layout3D)
    }

    #[test]
    fn staging_appends_per_kind() {
        let mut scene = Scene::new();
        let a = scene.add_entity();
        let b = scene.add_entity();

        let mut staged = RendererAssignments::new();
        staged.add_entity_to_renderer(RendererKind::Triangle2D, a);
        staged.add_entity_to_renderer(RendererKind::Line3D, b);
        staged.add_entity_to_renderer(RendererKind::Triangle2D, b);

        assert_eq!(staged.entities(RendererKind::Triangle2D), &[a, b]);
        assert_eq!(staged.entities(RendererKind::Line3D), &[b]);
        assert!(staged.entities(RendererKind::Line2D).is_empty());
    }

    #[test]
    fn snapshot_resolves_meshes_in_order() {
        let mut scene = Scene::new();
        let a = scene.add_entity();
        let b = scene.add_entity();
        scene.add_component(a, Mesh2D(handle_2d(0))).unwrap();
        scene.add_component(b, Mesh2D(handle_2d(1))).unwrap();

        let mut staged = RendererAssignments::new();
        staged.add_entity_to_renderer(RendererKind::Triangle2D, a);
        staged.add_entity_to_renderer(RendererKind::Triangle2D, b);

        let snapshot = staged.snapshot(&scene);
        assert_eq!(
            snapshot.items(RendererKind::Triangle2D).unwrap(),
            &[
                DrawItem {
                    entity: a,
                    mesh: handle_2d(0)
                },
                DrawItem {
                    entity: b,
                    mesh: handle_2d(1)
                },
            ]
        );
        assert_eq!(snapshot.draw_count(), 2);
    }

    #[test]
    fn mesh_2d_takes_priority() {
        let mut scene = Scene::new();
        let e = scene.add_entity();
        scene.add_component(e, Mesh3D(handle_3d(5))).unwrap();
        scene.add_component(e, Mesh2D(handle_2d(4))).unwrap();

        let mut staged = RendererAssignments::new();
        staged.add_entity_to_renderer(RendererKind::Triangle2D, e);

        let snapshot = staged.snapshot(&scene);
        assert_eq!(
            snapshot.items(RendererKind::Triangle2D).unwrap()[0].mesh,
            handle_2d(4)
        );
    }

    #[test]
    fn unresolvable_entities_skipped() {
        let mut scene = Scene::new();
        let no_mesh = scene.add_entity();
        let wrong_layout = scene.add_entity();
        let removed = scene.add_entity();
        let good = scene.add_entity();
        scene.add_component(wrong_layout, Mesh3D(handle_3d(0))).unwrap();
        scene.add_component(removed, Mesh2D(handle_2d(1))).unwrap();
        scene.add_component(good, Mesh2D(handle_2d(2))).unwrap();
        scene.remove_entity(removed).unwrap();

        let mut staged = RendererAssignments::new();
        for e in [no_mesh, wrong_layout, removed, good] {
            staged.add_entity_to_renderer(RendererKind::Triangle2D, e);
        }

        let snapshot = staged.snapshot(&scene);
        let items = snapshot.items(RendererKind::Triangle2D).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].entity, good);
    }
}
