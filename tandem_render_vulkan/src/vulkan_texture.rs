/// Texture - a VkImage with its view, allocation and optional sampler
///
/// Used for sampled albedo images (with a sampler) and for the swapchain's
/// depth attachment (without one).

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use tandem_render::tandem::render::Extent2D;
use tandem_render::tandem::Result;
use tandem_render::render_err;

use crate::vulkan_context::GpuContext;

/// Albedo format: tightly packed RGBA8, sRGB encoded
pub(crate) const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

pub(crate) const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

pub struct Texture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    pub(crate) sampler: Option<vk::Sampler>,
    allocation: Option<Allocation>,
    pub(crate) extent: Extent2D,
    pub(crate) mip_levels: u32,
}

impl Texture {
    /// Create a device-local 2D image and a view over all of its mip levels
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        name: &str,
        extent: Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        mip_levels: u32,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<Self> {
        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .mip_levels(mip_levels)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_info, None)
                .map_err(|e| render_err!("tandem::vulkan", "Failed to create image '{}': {:?}", name, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate(name, requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                ctx.free(allocation);
                ctx.device.destroy_image(image, None);
                return Err(render_err!("tandem::vulkan", "Failed to bind image memory for '{}': {:?}", name, e));
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask,
                    base_mip_level: 0,
                    level_count: mip_levels,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = match ctx.device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    ctx.free(allocation);
                    ctx.device.destroy_image(image, None);
                    return Err(render_err!("tandem::vulkan", "Failed to create image view for '{}': {:?}", name, e));
                }
            };

            Ok(Self {
                ctx,
                image,
                view,
                sampler: None,
                allocation: Some(allocation),
                extent,
                mip_levels,
            })
        }
    }

    /// Attach a trilinear, repeating sampler covering every mip level
    pub(crate) fn create_sampler(&mut self) -> Result<()> {
        let anisotropy = self.ctx.max_sampler_anisotropy;
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(anisotropy > 1.0)
            .max_anisotropy(anisotropy.max(1.0))
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(self.mip_levels as f32)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { self.ctx.device.create_sampler(&info, None) }
            .map_err(|e| render_err!("tandem::vulkan", "Failed to create sampler: {:?}", e))?;
        self.sampler = Some(sampler);
        Ok(())
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            if let Some(sampler) = self.sampler.take() {
                self.ctx.device.destroy_sampler(sampler, None);
            }
            self.ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free(allocation);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
