//! Mesh data and the mesh pool arena.

use std::sync::Arc;

use ash::vk;
use qoal_core::constants::MIN_MESH_VERTICES;
use qoal_core::{MeshHandle, MeshHandleAllocator, VertexLayout};
use qoal_gpu::GpuBuffer;

use crate::backend::RenderBackend;
use crate::error::{RenderError, Result};
use crate::vertex::{Vertex2D, Vertex3D};

/// Vertices of one layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Vertices {
    TwoD(Vec<Vertex2D>),
    ThreeD(Vec<Vertex3D>),
}

impl Vertices {
    pub fn len(&self) -> usize {
        match self {
            Self::TwoD(v) => v.len(),
            Self::ThreeD(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layout(&self) -> VertexLayout {
        match self {
            Self::TwoD(_) => VertexLayout::Layout2D,
            Self::ThreeD(_) => VertexLayout::Layout3D,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::TwoD(v) => bytemuck::cast_slice(v),
            Self::ThreeD(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Validated CPU-side mesh, ready to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    vertices: Vertices,
    indices: Option<Vec<u32>>,
}

impl MeshData {
    /// A mesh of 2D vertices with optional indices.
    pub fn new_2d(vertices: Vec<Vertex2D>, indices: Option<Vec<u32>>) -> Result<Self> {
        Self::new(Vertices::TwoD(vertices), indices)
    }

    /// A mesh of 3D vertices with optional indices.
    pub fn new_3d(vertices: Vec<Vertex3D>, indices: Option<Vec<u32>>) -> Result<Self> {
        Self::new(Vertices::ThreeD(vertices), indices)
    }

    fn new(vertices: Vertices, indices: Option<Vec<u32>>) -> Result<Self> {
        let len = vertices.len();
        if len < MIN_MESH_VERTICES {
            return Err(RenderError::TooFewVertices {
                len,
                min: MIN_MESH_VERTICES,
            });
        }
        if let Some(&index) = indices
            .iter()
            .flatten()
            .find(|&&index| index as usize >= len)
        {
            return Err(RenderError::IndexOutOfRange { index, len });
        }
        Ok(Self { vertices, indices })
    }

    pub fn layout(&self) -> VertexLayout {
        self.vertices.layout()
    }

    pub fn vertices(&self) -> &Vertices {
        &self.vertices
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    /// Number of vertices; what a non-indexed draw of this mesh covers.
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }
}

/// Read access to uploaded meshes, used while recording draws.
pub trait MeshSource {
    fn vertex_buffer(&self, handle: MeshHandle) -> Option<vk::Buffer>;

    /// Vertex count of the mesh's vertex buffer.
    fn instance_count(&self, handle: MeshHandle) -> Option<u32>;
}

struct MeshSlot {
    layout: VertexLayout,
    vertex_buffer: GpuBuffer,
    index_buffer: Option<GpuBuffer>,
    vertex_count: u32,
}

/// Arena of uploaded meshes indexed by [`MeshHandle`].
///
/// Owns every vertex and index buffer it uploads. Buffers live until
/// [`MeshPool::destroy_all`], which must run before the backend is dropped.
pub struct MeshPool {
    handles: Arc<MeshHandleAllocator>,
    slots: Vec<Option<MeshSlot>>,
}

impl MeshPool {
    /// Create a pool sharing a handle allocator with the producer side.
    pub fn new(handles: Arc<MeshHandleAllocator>) -> Self {
        Self {
            handles,
            slots: Vec::new(),
        }
    }

    /// Allocate a handle and upload the mesh under it.
    pub fn create_mesh<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        data: &MeshData,
    ) -> Result<MeshHandle> {
        let handle = self.handles.allocate(data.layout());
        self.insert(backend, handle, data)?;
        Ok(handle)
    }

    /// Upload a mesh under a handle allocated elsewhere.
    ///
    /// A mesh already stored under the handle is replaced and its buffers freed.
    pub fn insert<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        handle: MeshHandle,
        data: &MeshData,
    ) -> Result<()> {
        debug_assert_eq!(handle.layout(), data.layout());

        let vertex_buffer = backend.upload_buffer(
            data.vertices().as_bytes(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "mesh vertices",
        )?;
        let index_buffer = match data.indices() {
            Some(indices) => match backend.upload_buffer(
                bytemuck::cast_slice(indices),
                vk::BufferUsageFlags::INDEX_BUFFER,
                "mesh indices",
            ) {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    backend.destroy_buffer(vertex_buffer);
                    return Err(e.into());
                }
            },
            None => None,
        };

        let index = handle.index() as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        let previous = self.slots[index].replace(MeshSlot {
            layout: data.layout(),
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertex_count(),
        });
        if let Some(previous) = previous {
            tracing::warn!("Mesh {:?} replaced", handle);
            release(backend, previous);
        }

        tracing::debug!(
            "Uploaded mesh {} ({:?}, {} vertices)",
            handle.index(),
            data.layout(),
            data.vertex_count()
        );
        Ok(())
    }

    /// Whether a mesh is stored under the handle with a matching layout.
    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Index buffer of a mesh, when it was created with indices.
    pub fn index_buffer(&self, handle: MeshHandle) -> Option<vk::Buffer> {
        self.slot(handle)?.index_buffer.as_ref().map(|b| b.buffer)
    }

    /// Number of stored meshes.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free every buffer in one pass.
    pub fn destroy_all<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        let count = self.len();
        for slot in self.slots.drain(..).flatten() {
            release(backend, slot);
        }
        tracing::debug!("Mesh pool released {count} meshes");
    }

    fn slot(&self, handle: MeshHandle) -> Option<&MeshSlot> {
        self.slots
            .get(handle.index() as usize)?
            .as_ref()
            .filter(|slot| slot.layout == handle.layout())
    }
}

impl MeshSource for MeshPool {
    fn vertex_buffer(&self, handle: MeshHandle) -> Option<vk::Buffer> {
        self.slot(handle).map(|slot| slot.vertex_buffer.buffer)
    }

    fn instance_count(&self, handle: MeshHandle) -> Option<u32> {
        self.slot(handle).map(|slot| slot.vertex_count)
    }
}

fn release<B: RenderBackend + ?Sized>(backend: &mut B, slot: MeshSlot) {
    if let Some(index_buffer) = slot.index_buffer {
        backend.destroy_buffer(index_buffer);
    }
    backend.destroy_buffer(slot.vertex_buffer);
}
