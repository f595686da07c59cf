//! Integration tests for VulkanDevice
//!
//! All tests require a GPU and a window, and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_device_tests -- --ignored

use serial_test::serial;
use tandem_render::tandem::render::{AttributeFormat, BufferUsage, RenderStats, IMAGE_CHANNELS};
use tandem_render::tandem::{Config, Error, RenderDevice};
use tandem_render_vulkan::VulkanDevice;
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Hidden window for tests
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Tandem Vulkan Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn create_device(window: &Window) -> VulkanDevice {
    VulkanDevice::new(window, 800, 600, Config::default()).unwrap()
}

fn positions() -> Vec<u8> {
    let vertices: [f32; 12] = [
        -0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.5, 0.5, 0.0, -0.5, 0.5, 0.0,
    ];
    vertices.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn indices() -> Vec<u8> {
    [0u32, 1, 2, 2, 3, 0].iter().flat_map(|i| i.to_le_bytes()).collect()
}

// ============================================================================
// DEVICE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_device_creation() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    device.wait_idle().unwrap();
    assert_eq!(device.stats(), RenderStats::default());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_device_can_be_recreated() {
    let (window, _event_loop) = create_test_window();
    drop(create_device(&window));
    drop(create_device(&window));
}

// ============================================================================
// BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_and_destroy_buffers() {
    let (window, _event_loop) = create_test_window();
    let mut device = create_device(&window);

    let vertices = device.create_buffer(BufferUsage::Vertex, 12, 4, &positions()).unwrap();
    let indices = device.create_buffer(BufferUsage::Index, 4, 6, &indices()).unwrap();

    device.destroy_buffer(vertices).unwrap();
    device.destroy_buffer(indices).unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_destroyed_buffer_is_rejected() {
    let (window, _event_loop) = create_test_window();
    let mut device = create_device(&window);

    let buffer = device.create_buffer(BufferUsage::Vertex, 12, 4, &positions()).unwrap();
    device.destroy_buffer(buffer).unwrap();

    assert!(matches!(device.destroy_buffer(buffer), Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_buffer_size_mismatch_is_rejected() {
    let (window, _event_loop) = create_test_window();
    let mut device = create_device(&window);

    let result = device.create_buffer(BufferUsage::Vertex, 12, 5, &positions());
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

// ============================================================================
// IMAGE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_image_with_mips() {
    let (window, _event_loop) = create_test_window();
    let mut device = create_device(&window);

    let pixels = vec![200u8; 256 * 256 * 4];
    device.create_image("checker", 256, 256, IMAGE_CHANNELS, &pixels).unwrap();
    device.destroy_all_images().unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_image_cache_returns_same_handle() {
    let (window, _event_loop) = create_test_window();
    let mut device = create_device(&window);

    let pixels = vec![255u8; 4 * 4 * 4];
    let first = device.create_image("white", 4, 4, IMAGE_CHANNELS, &pixels).unwrap();
    let second = device.create_image("white", 4, 4, IMAGE_CHANNELS, &pixels).unwrap();

    assert_eq!(first, second);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_image_fallback() {
    let (window, _event_loop) = create_test_window();
    let mut device = create_device(&window);

    let fallback = device.create_image_or_fallback("missing", 16, 16, IMAGE_CHANNELS, None).unwrap();
    let truncated = device
        .create_image_or_fallback("broken", 16, 16, IMAGE_CHANNELS, Some(&[0u8; 7]))
        .unwrap();

    assert_eq!(fallback, truncated);
}

// ============================================================================
// PIPELINE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_invalid_spirv_is_rejected() {
    let (window, _event_loop) = create_test_window();
    let mut device = create_device(&window);

    let garbage = b"#version 450\nvoid main() {}\n";
    let result = device.create_pipeline(garbage, garbage, &[AttributeFormat::VEC3_FLOAT]);

    assert!(matches!(result, Err(Error::ShaderCompilation { .. })));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_resize_to_zero_and_back() {
    let (window, _event_loop) = create_test_window();
    let mut device = create_device(&window);

    device.resize(0, 0);
    device.resize(1024, 768);
    device.wait_idle().unwrap();
}
