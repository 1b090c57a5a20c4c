//! Vertex layouts understood by the renderers.

use std::mem::{offset_of, size_of};

use ash::vk;
use glam::{Vec2, Vec3, Vec4};
use qoal_core::VertexLayout;

/// Vertex of a 2D mesh.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex2D {
    pub position: [f32; 2],
    pub colour: [f32; 4],
    pub tex: [f32; 2],
}

impl Vertex2D {
    pub fn new(position: Vec2, colour: Vec4, tex: Vec2) -> Self {
        Self {
            position: position.to_array(),
            colour: colour.to_array(),
            tex: tex.to_array(),
        }
    }

    /// Single interleaved binding at slot 0.
    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    /// Locations 0..=2: position, colour, tex.
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            attribute(0, vk::Format::R32G32_SFLOAT, offset_of!(Self, position)),
            attribute(1, vk::Format::R32G32B32A32_SFLOAT, offset_of!(Self, colour)),
            attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Self, tex)),
        ]
    }
}

/// Vertex of a 3D mesh.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub colour: [f32; 4],
    pub tex: [f32; 2],
}

impl Vertex3D {
    pub fn new(position: Vec3, normal: Vec3, colour: Vec4, tex: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            colour: colour.to_array(),
            tex: tex.to_array(),
        }
    }

    /// Single interleaved binding at slot 0.
    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    /// Locations 0..=3: position, normal, colour, tex.
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, normal)),
            attribute(2, vk::Format::R32G32B32A32_SFLOAT, offset_of!(Self, colour)),
            attribute(3, vk::Format::R32G32_SFLOAT, offset_of!(Self, tex)),
        ]
    }
}

fn attribute(location: u32, format: vk::Format, offset: usize) -> vk::VertexInputAttributeDescription {
    vk::VertexInputAttributeDescription {
        location,
        binding: 0,
        format,
        offset: offset as u32,
    }
}

/// Binding and attribute descriptions for a layout.
pub fn vertex_input(
    layout: VertexLayout,
) -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    match layout {
        VertexLayout::Layout2D => (
            Vertex2D::binding_descriptions(),
            Vertex2D::attribute_descriptions(),
        ),
        VertexLayout::Layout3D => (
            Vertex3D::binding_descriptions(),
            Vertex3D::attribute_descriptions(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_2d_is_tightly_packed() {
        assert_eq!(size_of::<Vertex2D>(), 32);
        let offsets: Vec<u32> = Vertex2D::attribute_descriptions()
            .iter()
            .map(|a| a.offset)
            .collect();
        assert_eq!(offsets, vec![0, 8, 24]);
        assert_eq!(Vertex2D::binding_descriptions()[0].stride, 32);
    }

    #[test]
    fn layout_3d_is_tightly_packed() {
        assert_eq!(size_of::<Vertex3D>(), 48);
        let attributes = Vertex3D::attribute_descriptions();
        let offsets: Vec<u32> = attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 40]);
        let locations: Vec<u32> = attributes.iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2, 3]);
    }

    #[test]
    fn vertex_input_selects_by_layout() {
        let (bindings, attributes) = vertex_input(VertexLayout::Layout3D);
        assert_eq!(bindings[0].stride, 48);
        assert_eq!(attributes.len(), 4);
    }

    #[test]
    fn constructor_copies_components() {
        let v = Vertex2D::new(Vec2::new(0.5, -0.5), Vec4::new(1.0, 0.0, 0.0, 1.0), Vec2::ZERO);
        assert_eq!(v.position, [0.5, -0.5]);
        assert_eq!(bytemuck::bytes_of(&v).len(), 32);
    }
}
