/// Buffer - a VkBuffer and its allocation, released on drop

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use tandem_render::tandem::Result;
use tandem_render::{render_bail, render_err};

use crate::vulkan_context::GpuContext;

pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    pub(crate) size: u64,
}

impl Buffer {
    /// Create a buffer and bind fresh memory from `location` to it
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| render_err!("tandem::vulkan", "Failed to create {} buffer of {} bytes: {:?}", name, size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match ctx.allocate(name, requirements, location, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                ctx.free(allocation);
                ctx.device.destroy_buffer(buffer, None);
                render_bail!("tandem::vulkan", "Failed to bind {} buffer memory: {:?}", name, e);
            }

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size,
            })
        }
    }

    /// Copy `data` into a host-visible buffer at `offset`
    pub(crate) fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            render_bail!(
                "tandem::vulkan",
                "Write of {} bytes at offset {} overflows a {} byte buffer",
                data.len(), offset, self.size
            );
        }

        let mapped = self
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .ok_or_else(|| render_err!("tandem::vulkan", "Buffer is not CPU-accessible"))?;

        unsafe {
            let dst = (mapped.as_ptr() as *mut u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
