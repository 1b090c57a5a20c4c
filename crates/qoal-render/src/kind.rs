//! Renderer kinds: one topology and shader pair each.

use std::path::Path;

use ash::vk;
use qoal_core::VertexLayout;
use qoal_gpu::ShaderPair;

/// Closed set of render strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RendererKind {
    Triangle2D,
    Triangle3D,
    Line2D,
    Line3D,
}

impl RendererKind {
    pub const ALL: [Self; 4] = [Self::Triangle2D, Self::Triangle3D, Self::Line2D, Self::Line3D];

    pub fn topology(self) -> vk::PrimitiveTopology {
        match self {
            Self::Triangle2D | Self::Triangle3D => vk::PrimitiveTopology::TRIANGLE_LIST,
            Self::Line2D | Self::Line3D => vk::PrimitiveTopology::LINE_LIST,
        }
    }

    /// Vertex layout the pipeline consumes.
    pub fn layout(self) -> VertexLayout {
        match self {
            Self::Triangle2D | Self::Line2D => VertexLayout::Layout2D,
            Self::Triangle3D | Self::Line3D => VertexLayout::Layout3D,
        }
    }

    /// File stem of the SPIR-V pair.
    pub fn shader_stem(self) -> &'static str {
        match self {
            Self::Triangle2D => "base_triangle_2d",
            Self::Triangle3D => "base_triangle_3d",
            Self::Line2D => "base_line_2d",
            Self::Line3D => "base_line_3d",
        }
    }

    pub fn shaders(self, dir: &Path) -> ShaderPair {
        ShaderPair::from_stem(dir, self.shader_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_pair_topology_with_layout() {
        assert_eq!(
            RendererKind::Triangle2D.topology(),
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
        assert_eq!(RendererKind::Line3D.topology(), vk::PrimitiveTopology::LINE_LIST);
        assert_eq!(RendererKind::Line2D.layout(), VertexLayout::Layout2D);
        assert_eq!(RendererKind::Triangle3D.layout(), VertexLayout::Layout3D);
    }

    #[test]
    fn shader_paths_use_stem() {
        let pair = RendererKind::Triangle3D.shaders(Path::new("spv"));
        assert_eq!(pair.vertex, Path::new("spv/base_triangle_3d.vert.spv"));
    }

    #[test]
    fn stems_are_distinct() {
        let mut stems: Vec<_> = RendererKind::ALL.iter().map(|k| k.shader_stem()).collect();
        stems.sort_unstable();
        stems.dedup();
        assert_eq!(stems.len(), RendererKind::ALL.len());
    }
}
