/*!
# Tandem Render - Vulkan Backend

Explicit-API implementation of the `tandem_render` device contract, built on
ash for the Vulkan bindings and gpu-allocator for memory management.

Uploads go through a host-visible staging buffer and a blocking one-time
command buffer. Frames are paced by per-slot fences and semaphores; the
swapchain, depth buffer and framebuffers are rebuilt together whenever the
surface goes out of date.

```no_run
use tandem_render::tandem::{Config, RenderDevice};
use tandem_render_vulkan::VulkanDevice;
# fn demo<W>(window: &W) -> tandem_render::tandem::Result<()>
# where W: raw_window_handle::HasDisplayHandle + raw_window_handle::HasWindowHandle {
let mut device = VulkanDevice::new(window, 1280, 720, Config::default())?;
device.wait_idle()?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_context;
mod vulkan_descriptors;
mod vulkan_pipeline;
mod vulkan_presenter;
mod vulkan_swapchain;
mod vulkan_texture;
mod vulkan_transfer;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan::{VulkanDevice, VulkanTypes};
