//! Graphics pipeline creation.

use crate::error::{GpuError, Result};
use ash::vk;

/// Graphics pipeline configuration.
#[derive(Clone)]
pub struct GraphicsPipelineConfig {
    pub vertex_shader: Vec<u32>,
    pub fragment_shader: Vec<u32>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            vertex_shader: Vec::new(),
            fragment_shader: Vec::new(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }
}

/// Graphics pipeline wrapper.
#[derive(Debug, PartialEq, Eq)]
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create a graphics pipeline for a render pass, with dynamic viewport and scissor.
    ///
    /// # Safety
    /// The device and render pass must be valid and shader code must be valid SPIR-V.
    pub unsafe fn new(device: &ash::Device, config: &GraphicsPipelineConfig) -> Result<Self> {
        if config.render_pass == vk::RenderPass::null() {
            return Err(GpuError::PipelineCreation(
                "No render pass given".to_string(),
            ));
        }

        let vert_module = create_shader_module(device, &config.vertex_shader, "vertex")?;
        let frag_module = match create_shader_module(device, &config.fragment_shader, "fragment") {
            Ok(module) => module,
            Err(e) => {
                device.destroy_shader_module(vert_module, None);
                return Err(e);
            }
        };

        let result = build_pipeline(device, config, vert_module, frag_module);

        // Modules are only needed during creation
        device.destroy_shader_module(vert_module, None);
        device.destroy_shader_module(frag_module, None);

        result
    }

    /// Destroy the pipeline.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}

unsafe fn create_shader_module(
    device: &ash::Device,
    code: &[u32],
    stage: &str,
) -> Result<vk::ShaderModule> {
    if code.is_empty() {
        return Err(GpuError::ShaderModule(format!("{stage} shader is empty")));
    }
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    device
        .create_shader_module(&info, None)
        .map_err(|e| GpuError::ShaderModule(format!("{stage}: {e}")))
}

unsafe fn build_pipeline(
    device: &ash::Device,
    config: &GraphicsPipelineConfig,
    vert_module: vk::ShaderModule,
    frag_module: vk::ShaderModule,
) -> Result<GraphicsPipeline> {
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(c"main"),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(c"main"),
    ];

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&config.vertex_bindings)
        .vertex_attribute_descriptions(&config.vertex_attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(config.topology)
        .primitive_restart_enable(false);

    // Viewport and scissor are set per frame
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(config.polygon_mode)
        .cull_mode(config.cull_mode)
        .front_face(config.front_face)
        .depth_bias_enable(false)
        .line_width(1.0);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .sample_shading_enable(false)
        .min_sample_shading(1.0);

    let colour_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)];

    let colour_blending = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&colour_blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let layout_info = vk::PipelineLayoutCreateInfo::default();
    let layout = device
        .create_pipeline_layout(&layout_info, None)
        .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisampling)
        .color_blend_state(&colour_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(config.render_pass)
        .subpass(config.subpass);

    match device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None) {
        Ok(pipelines) => Ok(GraphicsPipeline {
            pipeline: pipelines[0],
            layout,
        }),
        Err((_pipelines, e)) => {
            device.destroy_pipeline_layout(layout, None);
            Err(GpuError::PipelineCreation(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_flat_2d_rendering() {
        let config = GraphicsPipelineConfig::default();
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(config.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(config.render_pass, vk::RenderPass::null());
    }
}
