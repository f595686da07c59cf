/// GpuContext - state shared by every Vulkan resource
///
/// Buffers, textures and pipelines each hold an `Arc<GpuContext>` so they can
/// release themselves on drop. The allocator sits in an `Option` so the
/// device can tear it down before `vkDestroyDevice`.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::sync::Mutex;
use tandem_render::tandem::{Error, Result};
use tandem_render::{render_err, render_error};

pub(crate) struct GpuContext {
    pub instance: ash::Instance,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,

    /// `None` once the device has started tearing down
    allocator: Mutex<Option<Allocator>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,

    /// TRANSIENT + RESET_COMMAND_BUFFER pool for one-time upload commands
    pub upload_command_pool: vk::CommandPool,

    pub max_sampler_anisotropy: f32,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance: ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        present_queue: vk::Queue,
        upload_command_pool: vk::CommandPool,
        max_sampler_anisotropy: f32,
    ) -> Self {
        Self {
            instance,
            device,
            physical_device,
            allocator: Mutex::new(Some(allocator)),
            graphics_queue,
            graphics_queue_family,
            present_queue,
            upload_command_pool,
            max_sampler_anisotropy,
        }
    }

    /// Allocate memory for a buffer or image
    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut guard = self
            .allocator
            .lock()
            .map_err(|_| render_err!("tandem::vulkan", "GPU allocator lock poisoned"))?;
        let allocator = guard
            .as_mut()
            .ok_or_else(|| render_err!("tandem::vulkan", "GPU allocator already shut down"))?;

        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                render_error!("tandem::vulkan", "Out of GPU memory for '{}' ({:.2} MB): {}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    /// Return an allocation to the allocator. Never fails: drop paths call this.
    pub fn free(&self, allocation: Allocation) {
        if let Ok(mut guard) = self.allocator.lock() {
            if let Some(allocator) = guard.as_mut() {
                allocator.free(allocation).ok();
            }
        }
    }

    /// Drop the allocator, releasing its device memory blocks
    pub fn shutdown_allocator(&self) {
        if let Ok(mut guard) = self.allocator.lock() {
            guard.take();
        }
    }

    pub fn supports_linear_blit(&self, format: vk::Format) -> bool {
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    }
}
