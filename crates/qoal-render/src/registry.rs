//! Live renderers on the render thread.

use ash::vk;
use qoal_core::RepublishPolicy;
use qoal_gpu::GraphicsPipeline;

use crate::backend::{CommandRecorder, RenderBackend};
use crate::error::Result;
use crate::kind::RendererKind;
use crate::mesh::MeshSource;
use crate::snapshot::{DrawItem, RegistrySnapshot};

/// A render strategy: one pipeline and the items it draws.
///
/// The pipeline is created with the renderer and destroyed with it.
#[derive(Debug)]
pub struct Renderer {
    kind: RendererKind,
    pipeline: GraphicsPipeline,
    items: Vec<DrawItem>,
}

impl Renderer {
    pub fn kind(&self) -> RendererKind {
        self.kind
    }

    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    /// Bind the pipeline and issue one non-indexed draw per item.
    ///
    /// Items whose mesh is not in the pool are skipped. Returns the number
    /// of draws recorded.
    pub fn record<R, M>(&self, recorder: &mut R, cmd: vk::CommandBuffer, meshes: &M) -> u32
    where
        R: CommandRecorder + ?Sized,
        M: MeshSource + ?Sized,
    {
        if self.items.is_empty() {
            return 0;
        }

        recorder.cmd_bind_pipeline(cmd, &self.pipeline);

        let mut draws = 0;
        for item in &self.items {
            let (Some(buffer), Some(count)) = (
                meshes.vertex_buffer(item.mesh),
                meshes.instance_count(item.mesh),
            ) else {
                tracing::warn!(
                    "{:?}: mesh {} of {:?} not uploaded, skipping",
                    self.kind,
                    item.mesh.index(),
                    item.entity
                );
                continue;
            };
            recorder.cmd_bind_vertex_buffer(cmd, buffer);
            recorder.cmd_draw(cmd, count);
            draws += 1;
        }
        draws
    }
}

/// Renderers keyed by kind, updated only between frames.
#[derive(Debug, Default)]
pub struct RendererRegistry {
    renderers: Vec<Renderer>,
    policy: RepublishPolicy,
}

impl RendererRegistry {
    pub fn new(policy: RepublishPolicy) -> Self {
        Self {
            renderers: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> RepublishPolicy {
        self.policy
    }

    pub fn renderers(&self) -> &[Renderer] {
        &self.renderers
    }

    pub fn renderer(&self, kind: RendererKind) -> Option<&Renderer> {
        self.renderers.iter().find(|r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Apply a snapshot as a whole.
    ///
    /// Pipelines for kinds seen for the first time are created up front. If
    /// any of them fails, the ones already built are destroyed and the
    /// registry is left exactly as it was.
    pub fn apply<B: RenderBackend + ?Sized>(
        &mut self,
        snapshot: &RegistrySnapshot,
        backend: &mut B,
    ) -> Result<()> {
        let mut created: Vec<Renderer> = Vec::new();
        for &(kind, _) in snapshot.entries() {
            if self.renderer(kind).is_some() || created.iter().any(|r| r.kind == kind) {
                continue;
            }
            match backend.create_pipeline(kind) {
                Ok(pipeline) => created.push(Renderer {
                    kind,
                    pipeline,
                    items: Vec::new(),
                }),
                Err(e) => {
                    tracing::error!("Failed to create pipeline for {kind:?}: {e}");
                    for renderer in created {
                        backend.destroy_pipeline(renderer.pipeline);
                    }
                    return Err(e.into());
                }
            }
        }

        let policy = self.policy;
        for renderer in &mut self.renderers {
            let Some(items) = snapshot.items(renderer.kind) else {
                continue;
            };
            match policy {
                RepublishPolicy::Replace => renderer.items = items.to_vec(),
                RepublishPolicy::Append => renderer.items.extend_from_slice(items),
                RepublishPolicy::Keep => {
                    tracing::debug!("{:?} already live, keeping its entities", renderer.kind);
                    continue;
                }
            }
            tracing::debug!(
                "{:?} now draws {} entities",
                renderer.kind,
                renderer.items.len()
            );
        }

        for mut renderer in created {
            if let Some(items) = snapshot.items(renderer.kind) {
                renderer.items = items.to_vec();
            }
            tracing::info!(
                "Registered {:?} renderer with {} entities",
                renderer.kind,
                renderer.items.len()
            );
            self.renderers.push(renderer);
        }
        Ok(())
    }

    /// Record every renderer's draws. Returns the total draw count.
    pub fn record<R, M>(&self, recorder: &mut R, cmd: vk::CommandBuffer, meshes: &M) -> u32
    where
        R: CommandRecorder + ?Sized,
        M: MeshSource + ?Sized,
    {
        self.renderers
            .iter()
            .map(|renderer| renderer.record(recorder, cmd, meshes))
            .sum()
    }

    /// Destroy every renderer's pipeline. The device must be idle.
    pub fn destroy<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for renderer in self.renderers.drain(..).rev() {
            backend.destroy_pipeline(renderer.pipeline);
        }
    }
}
