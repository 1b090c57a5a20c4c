//! Entity system for the Qoal engine.
//!
//! Uses hecs as the ECS backend. The scene store itself has no
//! concurrency control; it lives on the thread that builds the scene.

pub mod camera;
pub mod components;
pub mod scene;

pub use camera::Camera;
pub use components::{Component, ComponentKind, Mesh2D, Mesh3D, Transform2D, Transform3D};
pub use hecs::Entity;
pub use scene::Scene;

use thiserror::Error;

/// Scene store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The entity does not exist (never spawned or already removed).
    #[error("No such entity: {0:?}")]
    NoSuchEntity(Entity),

    /// The entity already has a component of this kind.
    #[error("Entity {entity:?} already has a {kind:?} component")]
    DuplicateComponent { entity: Entity, kind: ComponentKind },

    /// The entity has no component of this kind.
    #[error("Entity {entity:?} has no {kind:?} component")]
    MissingComponent { entity: Entity, kind: ComponentKind },

    /// Projection parameters would divide by zero.
    #[error("Invalid projection: {0}")]
    InvalidProjection(&'static str),
}

pub type Result<T> = std::result::Result<T, SceneError>;
