//! Immutable renderer assignments handed to the render thread.

use qoal_core::MeshHandle;
use qoal_entity::Entity;

use crate::kind::RendererKind;

/// One entity to draw, with its mesh already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    pub entity: Entity,
    pub mesh: MeshHandle,
}

/// Renderer kind to draw list mapping, applied as a whole between frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    entries: Vec<(RendererKind, Vec<DrawItem>)>,
}

impl RegistrySnapshot {
    pub fn new(entries: Vec<(RendererKind, Vec<DrawItem>)>) -> Self {
        Self { entries }
    }

    /// Entries in the order their kinds were first staged.
    pub fn entries(&self) -> &[(RendererKind, Vec<DrawItem>)] {
        &self.entries
    }

    /// Draw list for a kind, if the snapshot names it.
    pub fn items(&self, kind: RendererKind) -> Option<&[DrawItem]> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, items)| items.as_slice())
    }

    /// Total draw items across all kinds.
    pub fn draw_count(&self) -> usize {
        self.entries.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
