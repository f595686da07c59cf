/// VulkanRecorder - records a batch into an open render pass

use ash::vk;
use tandem_render::tandem::registry::{DescriptorsRecord, PipelineRecord, ResolvedDraw};
use tandem_render::tandem::render::{CommandRecorder, IndexType, PushConstants};
use tandem_render::tandem::Result;

use crate::vulkan::VulkanTypes;
use crate::vulkan_pipeline::Pipeline;

pub(crate) struct VulkanRecorder<'a> {
    device: &'a ash::Device,
    cmd: vk::CommandBuffer,
}

impl<'a> VulkanRecorder<'a> {
    pub fn new(device: &'a ash::Device, cmd: vk::CommandBuffer) -> Self {
        Self { device, cmd }
    }
}

impl CommandRecorder<VulkanTypes> for VulkanRecorder<'_> {
    fn bind_pipeline(&mut self, pipeline: &PipelineRecord<Pipeline>) -> Result<()> {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.gpu.pipeline);
        }
        Ok(())
    }

    fn bind_descriptors(
        &mut self,
        pipeline: &PipelineRecord<Pipeline>,
        descriptors: &DescriptorsRecord<vk::DescriptorSet>,
    ) -> Result<()> {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.gpu.layout,
                0,
                &[descriptors.gpu],
                &[],
            );
        }
        Ok(())
    }

    fn push_constants(&mut self, pipeline: &PipelineRecord<Pipeline>, constants: &PushConstants) -> Result<()> {
        unsafe {
            self.device.cmd_push_constants(
                self.cmd,
                pipeline.gpu.layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                constants.as_bytes(),
            );
        }
        Ok(())
    }

    fn bind_geometry(&mut self, draw: &ResolvedDraw<'_, VulkanTypes>) -> Result<()> {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.cmd, 0, &[draw.vertex_buffer.gpu.buffer], &[0]);
            self.device.cmd_bind_index_buffer(
                self.cmd,
                draw.index_buffer.gpu.buffer,
                0,
                index_type_to_vk(draw.geometry.index_type),
            );
        }
        Ok(())
    }

    fn draw_indexed(&mut self, _draw: &ResolvedDraw<'_, VulkanTypes>, index_count: u32) -> Result<()> {
        unsafe {
            self.device.cmd_draw_indexed(self.cmd, index_count, 1, 0, 0, 0);
        }
        Ok(())
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}
