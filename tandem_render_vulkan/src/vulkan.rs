/// VulkanDevice - explicit-API implementation of `RenderDevice`
///
/// Owns the instance, logical device, allocator, presenter and every resource
/// it hands out. All of it is torn down by `Drop` in dependency order.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::Arc;
use tandem_render::frame::{drive_frame, FrameSynchronizer, PresentSurface};
use tandem_render::glam::{Mat4, Vec3};
use tandem_render::tandem::registry::{
    check_image_payload, BufferHandle, BufferRecord, DescriptorsHandle, DescriptorsRecord, GeometryHandle,
    GeometryRecord, ImageHandle, PipelineHandle, PipelineRecord, ResourceTables,
};
use tandem_render::tandem::render::{
    record_batch, AttributeFormat, BufferUsage, Extent2D, FrameStatus, GpuTypes, Overlay, OverlayTarget,
    RenderStats, VertexLayout,
};
use tandem_render::tandem::{Config, Error, RenderDevice, Result};
use tandem_render::{render_debug, render_err, render_error, render_info, render_warn};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::VulkanRecorder;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptors::DescriptorAllocator;
use crate::vulkan_pipeline::{build_pipeline, vulkan_projection, Pipeline};
use crate::vulkan_presenter::VulkanPresenter;
use crate::vulkan_swapchain::{choose_present_mode, choose_surface_format, SurfaceConfig};
use crate::vulkan_texture::Texture;
use crate::vulkan_transfer::TransferEngine;

/// GPU object types held in the explicit backend's resource tables
pub struct VulkanTypes;

impl GpuTypes for VulkanTypes {
    type Buffer = Buffer;
    type Image = Texture;
    type Pipeline = Pipeline;
    type Descriptors = vk::DescriptorSet;
    type VertexInput = ();
}

#[cfg(feature = "vulkan-validation")]
type DebugMessenger = Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>;

pub struct VulkanDevice {
    // Dropped by hand, before the device they were created from
    tables: ManuallyDrop<ResourceTables<VulkanTypes>>,
    descriptors: ManuallyDrop<DescriptorAllocator>,
    transfer: ManuallyDrop<TransferEngine>,
    sync: ManuallyDrop<FrameSynchronizer<VulkanPresenter>>,

    ctx: Arc<GpuContext>,
    config: Config,
    last_stats: RenderStats,

    #[cfg(feature = "vulkan-validation")]
    debug_messenger: DebugMessenger,

    // Keeps the Vulkan loader alive for the instance's lifetime
    _entry: ash::Entry,
}

impl VulkanDevice {
    /// Create a device rendering to `window`, initially `width` x `height` pixels
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        width: u32,
        height: u32,
        config: Config,
    ) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_failed("Failed to load Vulkan library", e))?;

            let display_handle = window
                .display_handle()
                .map_err(|e| init_failed("Failed to get display handle", e))?;
            let window_handle = window
                .window_handle()
                .map_err(|e| init_failed("Failed to get window handle", e))?;

            let validation = validation_requested(&config);

            // ===== INSTANCE =====

            let app_name = CString::new(config.app_name.clone()).unwrap_or_default();
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Tandem")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_failed("Failed to get required instance extensions", e))?
                .to_vec();
            let layer_names = if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let instance_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&instance_info, None)
                .map_err(|e| init_failed("Failed to create Vulkan instance", e))?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                Some(crate::debug::create_messenger(&entry, &instance)?)
            } else {
                None
            };

            // ===== SURFACE & PHYSICAL DEVICE =====

            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_failed("Failed to create surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let (physical_device, graphics_family, present_family) =
                pick_physical_device(&instance, &surface_loader, surface)?;

            let properties = instance.get_physical_device_properties(physical_device);
            let features = instance.get_physical_device_features(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            render_info!("tandem::vulkan", "Using GPU '{}'", device_name);

            // ===== LOGICAL DEVICE =====

            let queue_priorities = [1.0];
            let mut queue_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family)
                .queue_priorities(&queue_priorities)];
            if present_family != graphics_family {
                queue_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let anisotropy = features.sampler_anisotropy == vk::TRUE;
            let device_extensions = [ash::khr::swapchain::NAME.as_ptr()];
            let enabled_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy);
            let device_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_infos)
                .enabled_extension_names(&device_extensions)
                .enabled_features(&enabled_features);
            let device = instance
                .create_device(physical_device, &device_info, None)
                .map_err(|e| init_failed("Failed to create logical device", e))?;

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let present_queue = device.get_device_queue(present_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_failed("Failed to create GPU allocator", e))?;

            let upload_pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device
                .create_command_pool(&upload_pool_info, None)
                .map_err(|e| init_failed("Failed to create upload command pool", e))?;

            let ctx = Arc::new(GpuContext::new(
                instance.clone(),
                device.clone(),
                physical_device,
                allocator,
                graphics_queue,
                graphics_family,
                present_queue,
                upload_command_pool,
                if anisotropy { properties.limits.max_sampler_anisotropy } else { 1.0 },
            ));

            // ===== PRESENTATION =====

            let formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| init_failed("Failed to query surface formats", e))?;
            let format = choose_surface_format(&formats)
                .ok_or_else(|| init_failed("Surface offers no formats", "empty list"))?;
            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(|e| init_failed("Failed to query present modes", e))?;
            let surface_config = SurfaceConfig {
                surface,
                format,
                present_mode: choose_present_mode(&present_modes, config.vsync),
            };

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);
            let presenter = VulkanPresenter::new(
                Arc::clone(&ctx),
                surface_loader,
                swapchain_loader,
                surface_config,
                Extent2D::new(width, height),
            )?;

            let transfer = TransferEngine::new(Arc::clone(&ctx))?;
            let descriptors = DescriptorAllocator::new(Arc::clone(&ctx), config.max_descriptor_sets)?;

            render_info!(
                "tandem::vulkan",
                "Device ready: {:?} {:?}, {} descriptor sets",
                format.format, surface_config.present_mode, config.max_descriptor_sets
            );

            Ok(Self {
                tables: ManuallyDrop::new(ResourceTables::new()),
                descriptors: ManuallyDrop::new(descriptors),
                transfer: ManuallyDrop::new(transfer),
                sync: ManuallyDrop::new(FrameSynchronizer::new(presenter, config.acquire_timeout)),
                ctx,
                config,
                last_stats: RenderStats::default(),
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
                _entry: entry,
            })
        }
    }

    /// Projection for the current surface aspect
    fn default_projection(&self) -> Mat4 {
        vulkan_projection(&self.config, self.sync.extent())
    }
}

impl RenderDevice for VulkanDevice {
    fn create_buffer(&mut self, usage: BufferUsage, stride: u32, count: u32, data: &[u8]) -> Result<BufferHandle> {
        ResourceTables::<VulkanTypes>::check_buffer_payload(usage, stride, count, data)?;

        let vk_usage = match usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        };
        let gpu = self.transfer.upload_buffer(vk_usage, data)?;
        Ok(self.tables.buffers.register(BufferRecord { usage, stride, count, gpu }))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        self.tables.buffers.release(buffer).map(|_| ())
    }

    fn create_image(&mut self, name: &str, width: u32, height: u32, channels: u32, pixels: &[u8]) -> Result<ImageHandle> {
        if let Some(handle) = self.tables.images.lookup(name) {
            render_debug!("tandem::vulkan", "Image '{}' served from cache", name);
            return Ok(handle);
        }
        check_image_payload(width, height, channels, pixels)?;

        let transfer = &self.transfer;
        self.tables.images.get_or_upload(name, Extent2D::new(width, height), || {
            let texture = transfer.upload_image(name, width, height, pixels)?;
            let mip_levels = texture.mip_levels;
            Ok((texture, mip_levels))
        })
    }

    fn destroy_all_images(&mut self) -> Result<()> {
        let (images, orphans) = self.tables.remove_all_images();
        for orphan in orphans {
            self.descriptors.free(orphan.gpu);
        }
        render_debug!("tandem::vulkan", "Destroyed {} image(s)", images.len());
        Ok(())
    }

    fn create_pipeline(&mut self, vertex_shader: &[u8], fragment_shader: &[u8], attributes: &[AttributeFormat]) -> Result<PipelineHandle> {
        let layout = VertexLayout::from_schema(attributes)?;
        let projection = self.default_projection();
        let gpu = build_pipeline(
            &self.ctx,
            self.sync.surface().render_pass(),
            vertex_shader,
            fragment_shader,
            &layout,
            &projection,
        )?;
        Ok(self.tables.pipelines.register(PipelineRecord { layout, gpu }))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        let (_pipeline, orphans) = self.tables.remove_pipeline(pipeline)?;
        for orphan in orphans {
            self.descriptors.free(orphan.gpu);
        }
        Ok(())
    }

    fn update_projection(&mut self, pipeline: PipelineHandle, projection: Mat4) -> Result<()> {
        let record = self.tables.pipelines.get(pipeline)?;
        // The uniform buffer is host-visible and shared by every frame in flight
        self.sync.wait_for_in_flight()?;
        record.gpu.write_projection(&projection)
    }

    fn create_descriptors(&mut self, pipeline: PipelineHandle, image: ImageHandle, color: Vec3) -> Result<DescriptorsHandle> {
        let (pipeline_record, image_record) = self.tables.check_descriptors(pipeline, image)?;
        let gpu = self.descriptors.bind(&pipeline_record.gpu, &image_record.gpu)?;
        render_debug!(
            "tandem::vulkan",
            "Descriptor set {}/{} allocated",
            self.descriptors.allocated(), self.config.max_descriptor_sets
        );
        Ok(self.tables.descriptors.register(DescriptorsRecord { pipeline, image, color, gpu }))
    }

    fn create_geometry(&mut self, pipeline: PipelineHandle, vertex_buffer: BufferHandle, index_buffer: BufferHandle) -> Result<GeometryHandle> {
        let plan = self.tables.plan_geometry(pipeline, vertex_buffer, index_buffer)?;
        let record = GeometryRecord {
            pipeline,
            vertex_buffer,
            index_buffer,
            index_count: plan.index_buffer.count,
            index_type: plan.index_type,
            gpu: (),
        };
        Ok(self.tables.geometries.register(record))
    }

    fn destroy_geometry(&mut self, geometry: GeometryHandle) -> Result<()> {
        self.tables.remove_geometry(geometry).map(|_| ())
    }

    fn render(
        &mut self,
        view: &Mat4,
        pipeline: PipelineHandle,
        transforms: &[Mat4],
        geometries: &[GeometryHandle],
        descriptors: &[DescriptorsHandle],
        overlay: &mut Overlay<'_>,
    ) -> Result<FrameStatus> {
        let device = &self.ctx.device;
        let clear_color = self.config.clear_color;

        let status = drive_frame(
            &*self.tables,
            &mut *self.sync,
            view,
            pipeline,
            transforms,
            geometries,
            descriptors,
            |presenter, token, batch| {
                let cmd = presenter.begin_pass(token.slot(), token.image_index(), clear_color)?;

                let mut recorder = VulkanRecorder::new(device, cmd);
                let stats = record_batch(&mut recorder, batch)?;

                let extent = presenter.extent();
                overlay(&OverlayTarget {
                    width: extent.width,
                    height: extent.height,
                    native_command_buffer: Some(cmd.as_raw()),
                })?;

                presenter.end_pass(cmd)?;
                Ok(stats)
            },
        )?;

        if let FrameStatus::Rendered(stats) = status {
            self.last_stats = stats;
        }
        Ok(status)
    }

    fn resize(&mut self, width: u32, height: u32) {
        render_debug!("tandem::vulkan", "Resize to {}x{} requested", width, height);
        self.sync.surface_mut().set_window_extent(Extent2D::new(width, height));
        self.sync.request_rebuild();
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| render_err!("tandem::vulkan", "Failed to wait idle: {:?}", e))
    }

    fn stats(&self) -> RenderStats {
        self.last_stats
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            // 1. Resources, then the objects they were allocated from
            ManuallyDrop::drop(&mut self.tables);
            ManuallyDrop::drop(&mut self.descriptors);
            ManuallyDrop::drop(&mut self.transfer);
            ManuallyDrop::drop(&mut self.sync);

            // 2. Device memory, before the device goes
            self.ctx.shutdown_allocator();
            self.ctx.device.destroy_command_pool(self.ctx.upload_command_pool, None);

            if Arc::strong_count(&self.ctx) > 1 {
                render_warn!(
                    "tandem::vulkan",
                    "{} GPU object(s) still alive at device teardown",
                    Arc::strong_count(&self.ctx) - 1
                );
            }

            // 3. Device, messenger, instance
            self.ctx.device.destroy_device(None);

            #[cfg(feature = "vulkan-validation")]
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                crate::debug::print_validation_report();
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.ctx.instance.destroy_instance(None);
        }
    }
}

// ============================================================================
// INITIALIZATION HELPERS
// ============================================================================

fn init_failed(what: &str, e: impl std::fmt::Debug) -> Error {
    render_error!("tandem::vulkan", "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

#[cfg(feature = "vulkan-validation")]
fn validation_requested(config: &Config) -> bool {
    config.enable_validation
}

#[cfg(not(feature = "vulkan-validation"))]
fn validation_requested(config: &Config) -> bool {
    if config.enable_validation {
        render_warn!(
            "tandem::vulkan",
            "Validation requested but the vulkan-validation feature is off, ignoring"
        );
    }
    false
}

/// First device with graphics + present queues and the swapchain extension,
/// discrete GPUs first. Returns `(device, graphics family, present family)`.
unsafe fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32, u32)> {
    let mut devices = instance
        .enumerate_physical_devices()
        .map_err(|e| init_failed("Failed to enumerate physical devices", e))?;
    devices.sort_by_key(|&device| {
        let kind = instance.get_physical_device_properties(device).device_type;
        device_type_rank(kind)
    });

    for device in devices {
        let families = instance.get_physical_device_queue_family_properties(device);
        let graphics = families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS));
        let present = (0..families.len() as u32).find(|&index| {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .unwrap_or(false)
        });

        let has_swapchain = instance
            .enumerate_device_extension_properties(device)
            .map(|extensions| {
                extensions.iter().any(|ext| {
                    ext.extension_name_as_c_str()
                        .map(|name| name == ash::khr::swapchain::NAME)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false);

        if let (Some(graphics), Some(present), true) = (graphics, present, has_swapchain) {
            return Ok((device, graphics as u32, present));
        }
    }

    Err(init_failed("No GPU with graphics, present and swapchain support", "none found"))
}

/// Lower ranks are preferred
pub(crate) fn device_type_rank(kind: vk::PhysicalDeviceType) -> u8 {
    match kind {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 4,
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
