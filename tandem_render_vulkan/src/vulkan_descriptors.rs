/// Descriptor binder
///
/// One fixed-size pool for the device's lifetime. Each descriptor set binds a
/// pipeline's projection uniform and one albedo image; the tint is pushed per
/// draw and never written here. Running out of sets is a configuration error:
/// the pool is not grown.

use ash::vk;
use std::sync::Arc;
use tandem_render::tandem::{Error, Result};
use tandem_render::{render_err, render_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_pipeline::{Pipeline, ALBEDO_BINDING, PROJECTION_BINDING};
use crate::vulkan_texture::Texture;

pub(crate) struct DescriptorAllocator {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
    capacity: u32,
    allocated: u32,
}

impl DescriptorAllocator {
    pub fn new(ctx: Arc<GpuContext>, capacity: u32) -> Result<Self> {
        let pool_sizes = pool_sizes(capacity);
        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(capacity);

        let pool = unsafe { ctx.device.create_descriptor_pool(&info, None) }.map_err(|e| {
            render_error!("tandem::vulkan", "Failed to create descriptor pool: {:?}", e);
            Error::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
        })?;

        Ok(Self {
            ctx,
            pool,
            capacity,
            allocated: 0,
        })
    }

    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Allocate a set for `pipeline` and point it at the projection uniform and `texture`
    pub fn bind(&mut self, pipeline: &Pipeline, texture: &Texture) -> Result<vk::DescriptorSet> {
        if self.allocated >= self.capacity {
            return Err(self.exhausted());
        }

        let sampler = texture
            .sampler
            .ok_or_else(|| render_err!("tandem::vulkan", "Image has no sampler and cannot be bound"))?;

        let set_layouts = [pipeline.set_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&set_layouts);

        let set = match unsafe { self.ctx.device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets[0],
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                return Err(self.exhausted());
            }
            Err(e) => return Err(render_err!("tandem::vulkan", "Failed to allocate descriptor set: {:?}", e)),
        };
        self.allocated += 1;

        let buffer_info = [vk::DescriptorBufferInfo::default()
            .buffer(pipeline.projection.buffer)
            .offset(0)
            .range(vk::WHOLE_SIZE)];
        let image_info = [vk::DescriptorImageInfo::default()
            .sampler(sampler)
            .image_view(texture.view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];

        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(PROJECTION_BINDING)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(ALBEDO_BINDING)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info),
        ];
        unsafe {
            self.ctx.device.update_descriptor_sets(&writes, &[]);
        }

        Ok(set)
    }

    /// Return a set to the pool
    pub fn free(&mut self, set: vk::DescriptorSet) {
        unsafe {
            self.ctx.device.free_descriptor_sets(self.pool, &[set]).ok();
        }
        self.allocated = self.allocated.saturating_sub(1);
    }

    fn exhausted(&self) -> Error {
        render_error!(
            "tandem::vulkan",
            "Descriptor pool exhausted ({} sets); raise Config::max_descriptor_sets",
            self.capacity
        );
        Error::DescriptorPoolExhausted { capacity: self.capacity }
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// One uniform buffer and one image sampler per set
pub(crate) fn pool_sizes(capacity: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: capacity,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: capacity,
        },
    ]
}

#[cfg(test)]
#[path = "vulkan_descriptors_tests.rs"]
mod tests;
