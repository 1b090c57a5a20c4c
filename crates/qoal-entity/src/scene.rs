//! Scene store: entities and their components.

use hecs::{Entity, EntityRef, World};

use crate::components::{Component, ComponentKind};
use crate::{Camera, Mesh2D, Mesh3D, Result, SceneError, Transform2D, Transform3D};

/// Entities with at most one component of each kind.
///
/// Entities are reported in insertion order.
#[derive(Default)]
pub struct Scene {
    world: World,
    order: Vec<Entity>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an entity with no components.
    pub fn add_entity(&mut self) -> Entity {
        let entity = self.world.spawn(());
        self.order.push(entity);
        entity
    }

    /// Despawn an entity and all of its components.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<()> {
        self.world
            .despawn(entity)
            .map_err(|_| SceneError::NoSuchEntity(entity))?;
        self.order.retain(|&e| e != entity);
        tracing::debug!("Despawned entity {:?}", entity);
        Ok(())
    }

    /// Whether the entity is alive.
    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    /// Attach a component. Fails if the entity already has one of this kind.
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> Result<()> {
        if self.entity_ref(entity)?.has::<C>() {
            return Err(SceneError::DuplicateComponent {
                entity,
                kind: C::KIND,
            });
        }
        self.world
            .insert_one(entity, component)
            .map_err(|_| SceneError::NoSuchEntity(entity))
    }

    /// Detach and return a component.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Result<C> {
        self.entity_ref(entity)?;
        self.world
            .remove_one::<C>(entity)
            .map_err(|_| SceneError::MissingComponent {
                entity,
                kind: C::KIND,
            })
    }

    /// Borrow a component.
    pub fn get<C: Component>(&self, entity: Entity) -> Result<hecs::Ref<'_, C>> {
        self.entity_ref(entity)?
            .get::<&C>()
            .ok_or(SceneError::MissingComponent {
                entity,
                kind: C::KIND,
            })
    }

    /// Mutably borrow a component.
    pub fn get_mut<C: Component>(&self, entity: Entity) -> Result<hecs::RefMut<'_, C>> {
        self.entity_ref(entity)?
            .get::<&mut C>()
            .ok_or(SceneError::MissingComponent {
                entity,
                kind: C::KIND,
            })
    }

    /// Whether the entity has a component of this type. False for dead entities.
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.world
            .entity(entity)
            .map(|e| e.has::<C>())
            .unwrap_or(false)
    }

    /// Kinds of the components attached to an entity.
    pub fn component_kinds(&self, entity: Entity) -> Result<Vec<ComponentKind>> {
        let entity_ref = self.entity_ref(entity)?;
        Ok(ComponentKind::ALL
            .into_iter()
            .filter(|kind| kind_present(&entity_ref, *kind))
            .collect())
    }

    /// Live entities in insertion order.
    pub fn entities(&self) -> &[Entity] {
        &self.order
    }

    /// Live entities having a component of this type, in insertion order.
    pub fn entities_with<C: Component>(&self) -> Vec<Entity> {
        self.order
            .iter()
            .copied()
            .filter(|&entity| self.has::<C>(entity))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The underlying world, for ad-hoc queries.
    pub fn world(&self) -> &World {
        &self.world
    }

    fn entity_ref(&self, entity: Entity) -> Result<EntityRef<'_>> {
        self.world
            .entity(entity)
            .map_err(|_| SceneError::NoSuchEntity(entity))
    }
}

fn kind_present(entity: &EntityRef<'_>, kind: ComponentKind) -> bool {
    match kind {
        ComponentKind::Transform2D => entity.has::<Transform2D>(),
        ComponentKind::Transform3D => entity.has::<Transform3D>(),
        ComponentKind::Mesh2D => entity.has::<Mesh2D>(),
        ComponentKind::Mesh3D => entity.has::<Mesh3D>(),
        ComponentKind::Camera => entity.has::<Camera>(),
    }
}
