//! Shared identifier types.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Vertex layout a mesh or pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexLayout {
    /// Position, colour and texture coordinates in 2D.
    Layout2D,
    /// Position, normal, colour and texture coordinates in 3D.
    Layout3D,
}

/// Handle to a mesh owned by the render thread's mesh pool.
///
/// Handles are allocated on the producer side so components can refer to a
/// mesh before its buffers have been uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    index: u32,
    layout: VertexLayout,
}

impl MeshHandle {
    /// Create a handle from its raw parts.
    pub const fn new(index: u32, layout: VertexLayout) -> Self {
        Self { index, layout }
    }

    /// Slot index in the mesh pool.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Vertex layout of the mesh.
    pub const fn layout(self) -> VertexLayout {
        self.layout
    }
}

/// Lock-free source of unique mesh handles.
#[derive(Debug, Default)]
pub struct MeshHandleAllocator {
    next: AtomicU32,
}

impl MeshHandleAllocator {
    /// Create an allocator starting at index 0.
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
        }
    }

    /// Allocate the next handle for a mesh with the given layout.
    pub fn allocate(&self, layout: VertexLayout) -> MeshHandle {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        MeshHandle::new(index, layout)
    }

    /// Number of handles handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}
