/// Transfer engine - staged, blocking uploads
///
/// Every upload copies the payload into a host-visible staging buffer, records
/// one command buffer that copies it into device-local memory (and, for images,
/// builds the whole mip chain by blitting), submits it and waits on a fence.
/// Uploads only happen at load time, so nothing here overlaps with rendering.

use ash::vk;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use tandem_render::tandem::render::{mip_extent, mip_level_count, Extent2D};
use tandem_render::tandem::Result;
use tandem_render::{render_debug, render_err, render_warn};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_texture::{Texture, COLOR_FORMAT};

pub(crate) struct TransferEngine {
    ctx: Arc<GpuContext>,
    fence: vk::Fence,
}

impl TransferEngine {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let fence = unsafe { ctx.device.create_fence(&vk::FenceCreateInfo::default(), None) }
            .map_err(|e| render_err!("tandem::vulkan", "Failed to create upload fence: {:?}", e))?;
        Ok(Self { ctx, fence })
    }

    /// Upload `bytes` into a new device-local buffer with `usage | TRANSFER_DST`
    pub fn upload_buffer(&self, usage: vk::BufferUsageFlags, bytes: &[u8]) -> Result<Buffer> {
        let size = bytes.len() as u64;
        let staging = self.staging(bytes)?;
        let buffer = Buffer::new(
            Arc::clone(&self.ctx),
            "device_buffer",
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
        )?;

        self.submit_and_wait(|device, cmd| unsafe {
            let region = vk::BufferCopy::default().size(size);
            device.cmd_copy_buffer(cmd, staging.buffer, buffer.buffer, &[region]);
        })?;

        render_debug!("tandem::vulkan", "Uploaded {} bytes to a device-local buffer", size);
        Ok(buffer)
    }

    /// Upload an RGBA8 image and generate its mip chain on the GPU.
    ///
    /// Falls back to a single level when the format cannot be linearly blitted.
    pub fn upload_image(&self, name: &str, width: u32, height: u32, pixels: &[u8]) -> Result<Texture> {
        let extent = Extent2D::new(width, height);
        let mip_levels = if self.ctx.supports_linear_blit(COLOR_FORMAT) {
            mip_level_count(width, height)
        } else {
            render_warn!("tandem::vulkan", "Linear blit unsupported for {:?}, '{}' gets no mipmaps", COLOR_FORMAT, name);
            1
        };

        let staging = self.staging(pixels)?;
        let mut texture = Texture::new(
            Arc::clone(&self.ctx),
            name,
            extent,
            COLOR_FORMAT,
            vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            mip_levels,
            vk::ImageAspectFlags::COLOR,
        )?;

        let image = texture.image;
        self.submit_and_wait(|device, cmd| unsafe {
            let to_transfer = image_barrier(image, 0, mip_levels)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy::default()
                .image_subresource(color_layers(0))
                .image_extent(vk::Extent3D { width, height, depth: 1 });
            device.cmd_copy_buffer_to_image(
                cmd,
                staging.buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            record_mip_chain(device, cmd, image, extent, mip_levels);
        })?;

        texture.create_sampler()?;
        render_debug!(
            "tandem::vulkan",
            "Uploaded image '{}' ({}x{}, {} mip levels)",
            name, width, height, mip_levels
        );
        Ok(texture)
    }

    fn staging(&self, bytes: &[u8]) -> Result<Buffer> {
        let staging = Buffer::new(
            Arc::clone(&self.ctx),
            "staging_buffer",
            bytes.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        staging.write(0, bytes)?;
        Ok(staging)
    }

    /// Record `record` into a one-time command buffer, submit it and block until it completes
    fn submit_and_wait<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let device = &self.ctx.device;
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.ctx.upload_command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cmd = device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| render_err!("tandem::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.record_and_submit(cmd, record);
            device.free_command_buffers(self.ctx.upload_command_pool, &[cmd]);
            result
        }
    }

    unsafe fn record_and_submit<F>(&self, cmd: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let device = &self.ctx.device;

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device
            .begin_command_buffer(cmd, &begin_info)
            .map_err(|e| render_err!("tandem::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

        record(device, cmd);

        device
            .end_command_buffer(cmd)
            .map_err(|e| render_err!("tandem::vulkan", "Failed to end upload command buffer: {:?}", e))?;

        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        device
            .queue_submit(self.ctx.graphics_queue, &[submit_info], self.fence)
            .map_err(|e| render_err!("tandem::vulkan", "Failed to submit upload: {:?}", e))?;

        device
            .wait_for_fences(&[self.fence], true, u64::MAX)
            .map_err(|e| render_err!("tandem::vulkan", "Failed to wait for upload fence: {:?}", e))?;
        device
            .reset_fences(&[self.fence])
            .map_err(|e| render_err!("tandem::vulkan", "Failed to reset upload fence: {:?}", e))
    }
}

impl Drop for TransferEngine {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

/// Blit each level from its predecessor, leaving every level SHADER_READ_ONLY.
///
/// Expects all levels in TRANSFER_DST_OPTIMAL with level 0 filled.
unsafe fn record_mip_chain(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    extent: Extent2D,
    mip_levels: u32,
) {
    for level in 1..mip_levels {
        let src_level = level - 1;
        let src = mip_extent(extent.width, extent.height, src_level);
        let dst = mip_extent(extent.width, extent.height, level);

        let to_source = image_barrier(image, src_level, 1)
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::TRANSFER_READ);
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_source],
        );

        let blit = vk::ImageBlit::default()
            .src_subresource(color_layers(src_level))
            .src_offsets(blit_bounds(src))
            .dst_subresource(color_layers(level))
            .dst_offsets(blit_bounds(dst));
        device.cmd_blit_image(
            cmd,
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[blit],
            vk::Filter::LINEAR,
        );

        let to_shader = image_barrier(image, src_level, 1)
            .old_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_access_mask(vk::AccessFlags::TRANSFER_READ)
            .dst_access_mask(vk::AccessFlags::SHADER_READ);
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_shader],
        );
    }

    // The last level was only ever written
    let last = image_barrier(image, mip_levels - 1, 1)
        .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ);
    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[last],
    );
}

fn image_barrier(image: vk::Image, base_mip_level: u32, level_count: u32) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level,
            level_count,
            base_array_layer: 0,
            layer_count: 1,
        })
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Source/destination corners of a full-level blit
pub(crate) fn blit_bounds(extent: Extent2D) -> [vk::Offset3D; 2] {
    [
        vk::Offset3D { x: 0, y: 0, z: 0 },
        vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: 1,
        },
    ]
}

#[cfg(test)]
#[path = "vulkan_transfer_tests.rs"]
mod tests;
