//! Camera component.

use glam::{Mat4, Vec4};

use crate::{Result, SceneError};

/// Camera holding a projection matrix.
///
/// Projections map depth to Vulkan's [0, 1] range with Y pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    /// Orthographic projection of the given view volume.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) -> Result<()> {
        if right == left || bottom == top || far == near {
            return Err(SceneError::InvalidProjection("degenerate orthographic volume"));
        }

        self.projection = Mat4::from_cols(
            Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (bottom - top), 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0 / (far - near), 0.0),
            Vec4::new(
                -(right + left) / (right - left),
                -(bottom + top) / (bottom - top),
                -near / (far - near),
                1.0,
            ),
        );
        Ok(())
    }

    /// Perspective projection with a vertical field of view in radians.
    pub fn set_perspective_projection(
        &mut self,
        fovy: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Result<()> {
        let tan_half_fovy = (fovy / 2.0).tan();
        if aspect.abs() <= f32::EPSILON || tan_half_fovy.abs() <= f32::EPSILON {
            return Err(SceneError::InvalidProjection("zero aspect or field of view"));
        }
        if far == near {
            return Err(SceneError::InvalidProjection("near and far planes coincide"));
        }

        self.projection = Mat4::from_cols(
            Vec4::new(1.0 / (aspect * tan_half_fovy), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / tan_half_fovy, 0.0, 0.0),
            Vec4::new(0.0, 0.0, far / (far - near), 1.0),
            Vec4::new(0.0, 0.0, -(far * near) / (far - near), 0.0),
        );
        Ok(())
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }
}
