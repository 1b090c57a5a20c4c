use qoal_core::MeshHandle;
use qoal_render::{MeshData, RegistrySnapshot};

/// Work the producer hands to the render thread.
#[derive(Debug)]
pub enum RenderCommand {
    /// Upload a mesh under a handle the producer already allocated.
    UploadMesh { handle: MeshHandle, data: MeshData },
    /// Replace the registry contents with a snapshot.
    Publish(RegistrySnapshot),
}
