/// Swapchain bundle
///
/// The swapchain, its image views, the depth buffer, the framebuffers and the
/// per-image render-finished semaphores are created and destroyed together.
/// Nothing in the bundle is ever resized on its own.

use ash::vk;
use std::sync::Arc;
use tandem_render::tandem::render::Extent2D;
use tandem_render::tandem::{Error, Result};
use tandem_render::{render_debug, render_err, render_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_texture::{Texture, DEPTH_FORMAT};

/// Surface properties chosen once at device creation
#[derive(Debug, Clone, Copy)]
pub(crate) struct SurfaceConfig {
    pub surface: vk::SurfaceKHR,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
}

pub(crate) struct SwapchainBundle {
    ctx: Arc<GpuContext>,
    loader: ash::khr::swapchain::Device,
    pub swapchain: vk::SwapchainKHR,
    pub extent: Extent2D,
    views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    /// One per image: signalled by whichever slot rendered into that image
    render_finished: Vec<vk::Semaphore>,
    depth: Texture,
}

impl SwapchainBundle {
    /// Build a bundle at `extent`, retiring `old_swapchain` if given
    pub fn create(
        ctx: &Arc<GpuContext>,
        loader: &ash::khr::swapchain::Device,
        surface: &SurfaceConfig,
        capabilities: &vk::SurfaceCapabilitiesKHR,
        render_pass: vk::RenderPass,
        extent: Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let device = &ctx.device;
        unsafe {
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(surface.surface)
                .min_image_count(choose_image_count(capabilities))
                .image_format(surface.format.format)
                .image_color_space(surface.format.color_space)
                .image_extent(vk::Extent2D {
                    width: extent.width,
                    height: extent.height,
                })
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(surface.present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = loader
                .create_swapchain(&create_info, None)
                .map_err(|e| render_err!("tandem::vulkan", "Failed to create swapchain: {:?}", e))?;

            // From here on, a partially built bundle cleans up through Drop
            let depth = match Texture::new(
                Arc::clone(ctx),
                "depth_buffer",
                extent,
                DEPTH_FORMAT,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                1,
                vk::ImageAspectFlags::DEPTH,
            ) {
                Ok(depth) => depth,
                Err(e) => {
                    loader.destroy_swapchain(swapchain, None);
                    return Err(e);
                }
            };

            let mut bundle = Self {
                ctx: Arc::clone(ctx),
                loader: loader.clone(),
                swapchain,
                extent,
                views: Vec::new(),
                framebuffers: Vec::new(),
                render_finished: Vec::new(),
                depth,
            };

            let images = loader
                .get_swapchain_images(swapchain)
                .map_err(|e| render_err!("tandem::vulkan", "Failed to get swapchain images: {:?}", e))?;

            for &image in &images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface.format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let view = device
                    .create_image_view(&view_info, None)
                    .map_err(|e| render_err!("tandem::vulkan", "Failed to create swapchain image view: {:?}", e))?;
                bundle.views.push(view);
            }

            let depth_view = bundle.depth.view;
            for &view in &bundle.views {
                let attachments = [view, depth_view];
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                let framebuffer = device
                    .create_framebuffer(&framebuffer_info, None)
                    .map_err(|e| render_err!("tandem::vulkan", "Failed to create framebuffer: {:?}", e))?;
                bundle.framebuffers.push(framebuffer);
            }

            for _ in 0..images.len() {
                let semaphore = device
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                    .map_err(|e| render_err!("tandem::vulkan", "Failed to create render-finished semaphore: {:?}", e))?;
                bundle.render_finished.push(semaphore);
            }

            render_debug!(
                "tandem::vulkan",
                "Swapchain bundle built: {} images at {}x{}",
                images.len(), extent.width, extent.height
            );
            Ok(bundle)
        }
    }

    pub fn image_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn framebuffer(&self, image_index: u32) -> Result<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| render_err!("tandem::vulkan", "Swapchain image {} out of range", image_index))
    }

    pub fn render_finished(&self, image_index: u32) -> Result<vk::Semaphore> {
        self.render_finished
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| render_err!("tandem::vulkan", "Swapchain image {} out of range", image_index))
    }
}

impl Drop for SwapchainBundle {
    fn drop(&mut self) {
        unsafe {
            let device = &self.ctx.device;
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            for &view in &self.views {
                device.destroy_image_view(view, None);
            }
            for &semaphore in &self.render_finished {
                device.destroy_semaphore(semaphore, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        // The depth texture is released by its own Drop
    }
}

// ============================================================================
// RENDER PASS
// ============================================================================

/// Single-subpass pass: cleared color presented at the end, cleared depth discarded
pub(crate) fn create_render_pass(device: &ash::Device, color_format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    let dependencies = [frame_dependency()];

    let info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&info, None) }.map_err(|e| {
        render_error!("tandem::vulkan", "Failed to create render pass: {:?}", e);
        Error::InitializationFailed(format!("Failed to create render pass: {:?}", e))
    })
}

/// External dependency of the main pass
///
/// The depth image is shared by every frame in flight: the previous frame's
/// depth writes must land before this frame clears it.
pub(crate) fn frame_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        )
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
}

// ============================================================================
// SURFACE SELECTION
// ============================================================================

/// Prefer an sRGB BGRA/RGBA format, otherwise take the first one offered
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            (f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// FIFO under vsync; otherwise MAILBOX when offered. FIFO is always available.
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's fixed extent, or the window size clamped to what it allows
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window: Extent2D) -> Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return Extent2D::new(capabilities.current_extent.width, capabilities.current_extent.height);
    }
    Extent2D::new(
        window
            .width
            .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        window
            .height
            .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    )
}

/// One more than the minimum, within the maximum (0 means unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        wanted.min(capabilities.max_image_count)
    } else {
        wanted
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
