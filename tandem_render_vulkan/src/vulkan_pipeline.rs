/// Pipeline builder
///
/// Turns a SPIR-V shader pair and a vertex attribute schema into a graphics
/// pipeline with a fixed resource interface:
///
/// - set 0, binding 0: projection uniform buffer (vertex stage)
/// - set 0, binding 1: albedo combined image sampler (fragment stage)
/// - push constants: `{model, view, color}` for both stages
///
/// Viewport and scissor are dynamic so pipelines survive swapchain rebuilds.

use ash::vk;
use gpu_allocator::MemoryLocation;
use std::io::Cursor;
use std::sync::Arc;
use tandem_render::glam::Mat4;
use tandem_render::tandem::render::{AttributeFormat, Extent2D, PushConstants, VertexLayout};
use tandem_render::tandem::{Config, Error, Result};
use tandem_render::{render_debug, render_err, render_error};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;

pub(crate) const PROJECTION_BINDING: u32 = 0;
pub(crate) const ALBEDO_BINDING: u32 = 1;

const SPIRV_MAGIC: u32 = 0x0723_0203;

pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    /// Host-visible uniform buffer holding the projection matrix
    pub(crate) projection: Buffer,
}

impl Pipeline {
    pub(crate) fn write_projection(&self, projection: &Mat4) -> Result<()> {
        self.projection.write(0, bytemuck::bytes_of(projection))
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

// ============================================================================
// SHADER INTERFACE
// ============================================================================

/// What a shader stage declares, as far as the fixed interface cares
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ShaderInterface {
    /// `(set, binding)` of every descriptor the stage uses
    pub descriptors: Vec<(u32, u32)>,
    /// Size of the push-constant block, if any
    pub push_constant_bytes: Option<usize>,
}

/// Decode SPIR-V bytes into words, rejecting misaligned or non-SPIR-V input
pub(crate) fn decode_spirv(stage: &str, bytes: &[u8]) -> Result<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| shader_error(stage, format!("not valid SPIR-V: {}", e)))?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(shader_error(stage, "missing SPIR-V magic number".to_string()));
    }
    Ok(words)
}

/// Reflect the resources a stage uses
pub(crate) fn reflect_interface(stage: &str, words: &[u32]) -> Result<ShaderInterface> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| shader_error(stage, format!("reflection failed: {:?}", e)))?;

    let mut interface = ShaderInterface::default();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor { desc_bind, .. } => {
                    interface.descriptors.push((desc_bind.set(), desc_bind.bind()));
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    interface.push_constant_bytes = ty.nbyte();
                }
                _ => {}
            }
        }
    }
    Ok(interface)
}

/// Reject stages that need more than the fixed interface provides
pub(crate) fn check_interface(stage: &str, interface: &ShaderInterface) -> Result<()> {
    for &(set, binding) in &interface.descriptors {
        if set != 0 || (binding != PROJECTION_BINDING && binding != ALBEDO_BINDING) {
            return Err(shader_error(
                stage,
                format!("descriptor at set {} binding {} is outside the pipeline layout", set, binding),
            ));
        }
    }
    if let Some(size) = interface.push_constant_bytes {
        if size > PushConstants::SIZE as usize {
            return Err(shader_error(
                stage,
                format!("push-constant block is {} bytes, at most {} are pushed", size, PushConstants::SIZE),
            ));
        }
    }
    Ok(())
}

fn shader_error(stage: &str, log: String) -> Error {
    render_error!("tandem::vulkan", "Shader compilation failed ({} stage): {}", stage, log);
    Error::ShaderCompilation {
        stage: stage.to_string(),
        log,
    }
}

// ============================================================================
// FIXED-FUNCTION HELPERS
// ============================================================================

pub(crate) fn attribute_format_to_vk(format: AttributeFormat) -> vk::Format {
    match format {
        AttributeFormat::VEC3_FLOAT => vk::Format::R32G32B32_SFLOAT,
        AttributeFormat::VEC2_FLOAT => vk::Format::R32G32_SFLOAT,
    }
}

/// Single interleaved binding at slot 0, one attribute per schema entry
pub(crate) fn vertex_input_descriptions(
    layout: &VertexLayout,
) -> (vk::VertexInputBindingDescription, Vec<vk::VertexInputAttributeDescription>) {
    let binding = vk::VertexInputBindingDescription {
        binding: 0,
        stride: layout.stride(),
        input_rate: vk::VertexInputRate::VERTEX,
    };
    let attributes = layout
        .attributes()
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: 0,
            format: attribute_format_to_vk(attribute.format),
            offset: attribute.offset,
        })
        .collect();
    (binding, attributes)
}

/// Right-handed perspective with Vulkan's 0..1 depth and downward Y
pub(crate) fn vulkan_projection(config: &Config, extent: Extent2D) -> Mat4 {
    let mut projection = Mat4::perspective_rh(
        config.fov_y_degrees.to_radians(),
        extent.aspect_ratio(),
        config.near_plane,
        config.far_plane,
    );
    projection.y_axis.y *= -1.0;
    projection
}

// ============================================================================
// BUILD
// ============================================================================

/// Build a pipeline against `render_pass` and seed its projection uniform
pub(crate) fn build_pipeline(
    ctx: &Arc<GpuContext>,
    render_pass: vk::RenderPass,
    vertex_spirv: &[u8],
    fragment_spirv: &[u8],
    layout: &VertexLayout,
    projection: &Mat4,
) -> Result<Pipeline> {
    let vertex_words = decode_spirv("vertex", vertex_spirv)?;
    let fragment_words = decode_spirv("fragment", fragment_spirv)?;
    check_interface("vertex", &reflect_interface("vertex", &vertex_words)?)?;
    check_interface("fragment", &reflect_interface("fragment", &fragment_words)?)?;

    let device = &ctx.device;
    unsafe {
        let vertex_module = create_module(device, "vertex", &vertex_words)?;
        let fragment_module = match create_module(device, "fragment", &fragment_words) {
            Ok(module) => module,
            Err(e) => {
                device.destroy_shader_module(vertex_module, None);
                return Err(e);
            }
        };

        let result = build_with_modules(ctx, render_pass, vertex_module, fragment_module, layout, projection);

        device.destroy_shader_module(vertex_module, None);
        device.destroy_shader_module(fragment_module, None);
        result
    }
}

unsafe fn create_module(device: &ash::Device, stage: &str, words: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(words);
    device
        .create_shader_module(&info, None)
        .map_err(|e| shader_error(stage, format!("vkCreateShaderModule: {:?}", e)))
}

unsafe fn build_with_modules(
    ctx: &Arc<GpuContext>,
    render_pass: vk::RenderPass,
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
    layout: &VertexLayout,
    projection: &Mat4,
) -> Result<Pipeline> {
    let device = &ctx.device;

    // Descriptor set layout: projection UBO + albedo sampler
    let set_bindings = [
        vk::DescriptorSetLayoutBinding::default()
            .binding(PROJECTION_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(ALBEDO_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ];
    let set_layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&set_bindings);
    let set_layout = device
        .create_descriptor_set_layout(&set_layout_info, None)
        .map_err(|e| render_err!("tandem::vulkan", "Failed to create descriptor set layout: {:?}", e))?;

    let push_ranges = [vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        offset: 0,
        size: PushConstants::SIZE,
    }];
    let set_layouts = [set_layout];
    let layout_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&push_ranges);
    let pipeline_layout = match device.create_pipeline_layout(&layout_info, None) {
        Ok(pipeline_layout) => pipeline_layout,
        Err(e) => {
            device.destroy_descriptor_set_layout(set_layout, None);
            return Err(render_err!("tandem::vulkan", "Failed to create pipeline layout: {:?}", e));
        }
    };

    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(c"main"),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_module)
            .name(c"main"),
    ];

    let (binding, attributes) = vertex_input_descriptions(layout);
    let bindings = [binding];
    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    let viewports = [vk::Viewport::default()];
    let scissors = [vk::Rect2D::default()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::LESS);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)];
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .attachments(&blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
        .dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(pipeline_layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipeline = match device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None) {
        Ok(pipelines) => pipelines[0],
        Err((_, e)) => {
            device.destroy_pipeline_layout(pipeline_layout, None);
            device.destroy_descriptor_set_layout(set_layout, None);
            return Err(render_err!("tandem::vulkan", "Failed to create graphics pipeline: {:?}", e));
        }
    };

    // From here on, Drop owns the Vulkan objects
    let projection_buffer = Buffer::new(
        Arc::clone(ctx),
        "projection_uniform",
        std::mem::size_of::<Mat4>() as u64,
        vk::BufferUsageFlags::UNIFORM_BUFFER,
        MemoryLocation::CpuToGpu,
    );
    let projection_buffer = match projection_buffer {
        Ok(buffer) => buffer,
        Err(e) => {
            device.destroy_pipeline(pipeline, None);
            device.destroy_pipeline_layout(pipeline_layout, None);
            device.destroy_descriptor_set_layout(set_layout, None);
            return Err(e);
        }
    };

    let built = Pipeline {
        ctx: Arc::clone(ctx),
        pipeline,
        layout: pipeline_layout,
        set_layout,
        projection: projection_buffer,
    };
    built.write_projection(projection)?;

    render_debug!(
        "tandem::vulkan",
        "Built pipeline ({} attributes, stride {})",
        layout.attributes().len(), layout.stride()
    );
    Ok(built)
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
