/// VulkanPresenter - the explicit backend's `PresentSurface`
///
/// Owns the surface, the render pass, the swapchain bundle and one frame slot
/// per frame in flight (command buffer, fence, image-available semaphore).
/// Slot fences are created signalled so the first wait on each slot returns
/// immediately.

use ash::vk;
use std::sync::Arc;
use std::time::Duration;
use tandem_render::frame::{AcquireOutcome, PresentOutcome, PresentSurface};
use tandem_render::tandem::render::Extent2D;
use tandem_render::tandem::{Error, Result, MAX_FRAMES_IN_FLIGHT};
use tandem_render::{render_debug, render_err, render_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_swapchain::{choose_extent, create_render_pass, SurfaceConfig, SwapchainBundle};

struct FrameSlot {
    command_buffer: vk::CommandBuffer,
    in_flight: vk::Fence,
    image_available: vk::Semaphore,
}

pub(crate) struct VulkanPresenter {
    ctx: Arc<GpuContext>,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    surface: SurfaceConfig,
    render_pass: vk::RenderPass,
    command_pool: vk::CommandPool,
    slots: Vec<FrameSlot>,
    /// `None` while the surface has no area
    bundle: Option<SwapchainBundle>,
    /// Last size reported by the window
    window_extent: Extent2D,
}

impl VulkanPresenter {
    pub fn new(
        ctx: Arc<GpuContext>,
        surface_loader: ash::khr::surface::Instance,
        swapchain_loader: ash::khr::swapchain::Device,
        surface: SurfaceConfig,
        window_extent: Extent2D,
    ) -> Result<Self> {
        let device = &ctx.device;
        let render_pass = create_render_pass(device, surface.format.format)?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = match unsafe { device.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_render_pass(render_pass, None) };
                return Err(init_error("Failed to create frame command pool", e));
            }
        };

        let mut presenter = Self {
            ctx: Arc::clone(&ctx),
            surface_loader,
            swapchain_loader,
            surface,
            render_pass,
            command_pool,
            slots: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            bundle: None,
            window_extent,
        };

        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(MAX_FRAMES_IN_FLIGHT as u32);
            let command_buffers = device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| init_error("Failed to allocate frame command buffers", e))?;

            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            for command_buffer in command_buffers {
                let in_flight = device
                    .create_fence(&fence_info, None)
                    .map_err(|e| init_error("Failed to create in-flight fence", e))?;
                let image_available = match device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) {
                    Ok(semaphore) => semaphore,
                    Err(e) => {
                        device.destroy_fence(in_flight, None);
                        return Err(init_error("Failed to create image-available semaphore", e));
                    }
                };
                presenter.slots.push(FrameSlot {
                    command_buffer,
                    in_flight,
                    image_available,
                });
            }
        }

        presenter.rebuild()?;
        Ok(presenter)
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn set_window_extent(&mut self, extent: Extent2D) {
        self.window_extent = extent;
    }

    /// Begin slot `slot`'s command buffer and the render pass on `image_index`'s framebuffer
    pub fn begin_pass(&self, slot: usize, image_index: u32, clear_color: [f32; 4]) -> Result<vk::CommandBuffer> {
        let bundle = self.bundle()?;
        let framebuffer = bundle.framebuffer(image_index)?;
        let cmd = self.slot(slot)?.command_buffer;
        let extent = vk::Extent2D {
            width: bundle.extent.width,
            height: bundle.extent.height,
        };
        let device = &self.ctx.device;

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| render_err!("tandem::vulkan", "Failed to begin frame command buffer: {:?}", e))?;

            let clear_values = [
                vk::ClearValue {
                    color: vk::ClearColorValue { float32: clear_color },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
                },
            ];
            let pass_info = vk::RenderPassBeginInfo::default()
                .render_pass(self.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);
            device.cmd_begin_render_pass(cmd, &pass_info, vk::SubpassContents::INLINE);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(
                cmd,
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                }],
            );
        }
        Ok(cmd)
    }

    pub fn end_pass(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_end_render_pass(cmd);
            self.ctx
                .device
                .end_command_buffer(cmd)
                .map_err(|e| render_err!("tandem::vulkan", "Failed to end frame command buffer: {:?}", e))
        }
    }

    fn slot(&self, slot: usize) -> Result<&FrameSlot> {
        self.slots
            .get(slot)
            .ok_or_else(|| render_err!("tandem::vulkan", "Frame slot {} out of range", slot))
    }

    fn bundle(&self) -> Result<&SwapchainBundle> {
        self.bundle
            .as_ref()
            .ok_or_else(|| render_err!("tandem::vulkan", "No swapchain while the surface has no area"))
    }
}

impl PresentSurface for VulkanPresenter {
    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        let fence = self.slot(slot)?.in_flight;
        unsafe { self.ctx.device.wait_for_fences(&[fence], true, u64::MAX) }.map_err(|e| match e {
            vk::Result::ERROR_DEVICE_LOST => {
                render_error!("tandem::vulkan", "Device lost while waiting on slot {}", slot);
                Error::DeviceLost
            }
            e => render_err!("tandem::vulkan", "Failed to wait for slot {} fence: {:?}", slot, e),
        })
    }

    fn acquire_image(&mut self, slot: usize, timeout: Option<Duration>) -> Result<AcquireOutcome> {
        let semaphore = self.slot(slot)?.image_available;
        let swapchain = match &self.bundle {
            Some(bundle) => bundle.swapchain,
            None => return Ok(AcquireOutcome::OutOfDate),
        };
        let timeout_ns = timeout_to_ns(timeout);

        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout_ns, semaphore, vk::Fence::null())
        };
        classify_acquire(result)
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        let (fence, cmd) = {
            let slot = self.slot(slot)?;
            (slot.in_flight, slot.command_buffer)
        };
        unsafe {
            self.ctx
                .device
                .reset_fences(&[fence])
                .map_err(|e| render_err!("tandem::vulkan", "Failed to reset slot fence: {:?}", e))?;
            self.ctx
                .device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| render_err!("tandem::vulkan", "Failed to reset slot command buffer: {:?}", e))
        }
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let frame = self.slot(slot)?;
        let render_finished = self.bundle()?.render_finished(image_index)?;

        let wait_semaphores = [frame.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], frame.in_flight)
        }
        .map_err(|e| match e {
            vk::Result::ERROR_DEVICE_LOST => {
                render_error!("tandem::vulkan", "Device lost on submit");
                Error::DeviceLost
            }
            e => render_err!("tandem::vulkan", "Failed to submit frame: {:?}", e),
        })
    }

    fn present(&mut self, _slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let bundle = self.bundle()?;
        let wait_semaphores = [bundle.render_finished(image_index)?];
        let swapchains = [bundle.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.ctx.present_queue, &present_info)
        };
        classify_present(result)
    }

    fn abandon(&mut self, slot: usize, _image_index: u32) -> Result<()> {
        // Empty batch: consumes the acquire semaphore and re-signals the fence
        let frame = self.slot(slot)?;
        let wait_semaphores = [frame.image_available];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages);

        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], frame.in_flight)
        }
        .map_err(|e| render_err!("tandem::vulkan", "Failed to release abandoned frame: {:?}", e))
    }

    fn rebuild(&mut self) -> Result<Extent2D> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| render_err!("tandem::vulkan", "Failed to wait idle before rebuild: {:?}", e))?;
        }

        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface.surface)
        }
        .map_err(|e| render_err!("tandem::vulkan", "Failed to query surface capabilities: {:?}", e))?;

        let extent = choose_extent(&capabilities, self.window_extent);
        let old = self.bundle.take();
        if extent.is_zero_area() {
            render_debug!("tandem::vulkan", "Surface has no area, swapchain released");
            return Ok(extent);
        }

        let old_swapchain = old.as_ref().map_or(vk::SwapchainKHR::null(), |b| b.swapchain);
        let bundle = SwapchainBundle::create(
            &self.ctx,
            &self.swapchain_loader,
            &self.surface,
            &capabilities,
            self.render_pass,
            extent,
            old_swapchain,
        );
        drop(old);

        self.bundle = Some(bundle?);
        Ok(extent)
    }

    fn extent(&self) -> Extent2D {
        self.bundle
            .as_ref()
            .map_or(Extent2D::new(0, 0), |bundle| bundle.extent)
    }
}

impl Drop for VulkanPresenter {
    fn drop(&mut self) {
        unsafe {
            let device = &self.ctx.device;
            device.device_wait_idle().ok();

            self.bundle.take();
            for slot in self.slots.drain(..) {
                device.destroy_fence(slot.in_flight, None);
                device.destroy_semaphore(slot.image_available, None);
            }
            device.destroy_command_pool(self.command_pool, None);
            device.destroy_render_pass(self.render_pass, None);
            self.surface_loader.destroy_surface(self.surface.surface, None);
        }
    }
}

fn init_error(what: &str, e: vk::Result) -> Error {
    render_error!("tandem::vulkan", "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

/// `None` waits forever
pub(crate) fn timeout_to_ns(timeout: Option<Duration>) -> u64 {
    timeout.map_or(u64::MAX, |t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
}

pub(crate) fn classify_acquire(result: std::result::Result<(u32, bool), vk::Result>) -> Result<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Ok(AcquireOutcome::Timeout),
        Err(vk::Result::ERROR_DEVICE_LOST) => {
            render_error!("tandem::vulkan", "Device lost during acquire");
            Err(Error::DeviceLost)
        }
        Err(e) => Err(render_err!("tandem::vulkan", "Failed to acquire swapchain image: {:?}", e)),
    }
}

pub(crate) fn classify_present(result: std::result::Result<bool, vk::Result>) -> Result<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) => Ok(PresentOutcome::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
        Err(vk::Result::ERROR_DEVICE_LOST) => {
            render_error!("tandem::vulkan", "Device lost during present");
            Err(Error::DeviceLost)
        }
        Err(e) => Err(render_err!("tandem::vulkan", "Failed to present: {:?}", e)),
    }
}

#[cfg(test)]
#[path = "vulkan_presenter_tests.rs"]
mod tests;
