//! Component types and their closed set of kinds.

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use qoal_core::MeshHandle;

/// Every component kind the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transform2D,
    Transform3D,
    Mesh2D,
    Mesh3D,
    Camera,
}

impl ComponentKind {
    pub const ALL: [Self; 5] = [
        Self::Transform2D,
        Self::Transform3D,
        Self::Mesh2D,
        Self::Mesh3D,
        Self::Camera,
    ];
}

/// A component type stored in the scene, tagged with its kind.
pub trait Component: hecs::Component {
    const KIND: ComponentKind;
}

/// 2D placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub position: Vec2,
    pub scale: Vec2,
    /// Rotation in radians.
    pub rotation: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform2D {
    /// Translation * rotation about Z * scale.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale.extend(1.0),
            Quat::from_rotation_z(self.rotation),
            self.position.extend(0.0),
        )
    }
}

/// 3D placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub position: Vec3,
    pub scale: Vec3,
    /// Euler angles in radians, applied Y then X then Z.
    pub rotation: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl Transform3D {
    /// Translation * rotation * scale.
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Reference to a mesh made of 2D vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh2D(pub MeshHandle);

/// Reference to a mesh made of 3D vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh3D(pub MeshHandle);

impl Component for Transform2D {
    const KIND: ComponentKind = ComponentKind::Transform2D;
}

impl Component for Transform3D {
    const KIND: ComponentKind = ComponentKind::Transform3D;
}

impl Component for Mesh2D {
    const KIND: ComponentKind = ComponentKind::Mesh2D;
}

impl Component for Mesh3D {
    const KIND: ComponentKind = ComponentKind::Mesh3D;
}

impl Component for crate::Camera {
    const KIND: ComponentKind = ComponentKind::Camera;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_transforms() {
        assert_eq!(Transform2D::default().matrix(), Mat4::IDENTITY);
        assert_eq!(Transform3D::default().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn transform_2d_scales_rotates_then_translates() {
        let transform = Transform2D {
            position: Vec2::new(1.0, 2.0),
            scale: Vec2::new(2.0, 2.0),
            rotation: std::f32::consts::FRAC_PI_2,
        };
        let p = transform.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 4.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn transform_3d_translates() {
        let transform = Transform3D {
            position: Vec3::new(0.0, 0.0, 5.0),
            ..Default::default()
        };
        let p = transform.matrix().transform_point3(Vec3::ONE);
        assert_relative_eq!(p.z, 6.0);
    }
}
