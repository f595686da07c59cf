/// RenderDevice - the contract both backends implement
///
/// Resources are created once (scene build) and destroyed once (teardown).
/// Destroying a resource still referenced by an in-flight frame is undefined:
/// call `wait_idle` first.

use glam::{Mat4, Vec3};

use crate::device::types::{AttributeFormat, BufferUsage, IMAGE_CHANNELS};
use crate::error::Result;
use crate::registry::handle::{BufferHandle, DescriptorsHandle, GeometryHandle, ImageHandle, PipelineHandle};
use crate::render_warn;

/// Cache name of the placeholder image
pub const FALLBACK_IMAGE_NAME: &str = "__tandem_fallback";

/// 2x2 magenta/black checker used when a texture cannot be loaded
pub const FALLBACK_IMAGE_PIXELS: [u8; 16] = [
    255, 0, 255, 255, 0, 0, 0, 255,
    0, 0, 0, 255, 255, 0, 255, 255,
];

/// Counters for one rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub triangles: u64,
}

/// Why a frame was skipped. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The surface was out of date and has just been rebuilt
    SurfaceRebuilt,
    /// No presentable image within the configured acquire timeout
    AcquireTimeout,
    /// The surface has zero area (minimized window)
    Minimized,
}

/// Outcome of `render`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered(RenderStats),
    Skipped(SkipReason),
}

/// What the overlay callback may draw into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayTarget {
    pub width: u32,
    pub height: u32,
    /// Raw command buffer of the open pass on the explicit backend, `None` otherwise
    pub native_command_buffer: Option<u64>,
}

/// Overlay callback invoked inside the main pass after the batch
pub type Overlay<'a> = dyn FnMut(&OverlayTarget) -> Result<()> + 'a;

/// Hardware-abstracted GPU device
pub trait RenderDevice {
    /// Upload `count` elements of `stride` bytes into device memory
    fn create_buffer(&mut self, usage: BufferUsage, stride: u32, count: u32, data: &[u8]) -> Result<BufferHandle>;

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()>;

    /// Upload an RGBA8 image with a full mip chain, cached by `name`
    fn create_image(&mut self, name: &str, width: u32, height: u32, channels: u32, pixels: &[u8]) -> Result<ImageHandle>;

    fn destroy_all_images(&mut self) -> Result<()>;

    /// Build a pipeline from a shader pair and a vertex attribute schema.
    ///
    /// Shader format is backend-dependent: SPIR-V for the explicit backend,
    /// GLSL source text for the immediate-mode backend.
    fn create_pipeline(
        &mut self,
        vertex_shader: &[u8],
        fragment_shader: &[u8],
        attributes: &[AttributeFormat],
    ) -> Result<PipelineHandle>;

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()>;

    /// Replace a pipeline's projection matrix
    ///
    /// Frames already submitted may still read the old matrix, so backends
    /// that keep it in GPU-visible memory wait for them before writing.
    fn update_projection(&mut self, pipeline: PipelineHandle, projection: Mat4) -> Result<()>;

    fn create_descriptors(&mut self, pipeline: PipelineHandle, image: ImageHandle, color: Vec3) -> Result<DescriptorsHandle>;

    fn create_geometry(
        &mut self,
        pipeline: PipelineHandle,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
    ) -> Result<GeometryHandle>;

    /// Destroy a geometry and both of its buffers
    fn destroy_geometry(&mut self, geometry: GeometryHandle) -> Result<()>;

    /// Draw `(transforms[i], geometries[i], descriptors[i])` under one pipeline and view,
    /// then hand the open pass to `overlay`.
    fn render(
        &mut self,
        view: &Mat4,
        pipeline: PipelineHandle,
        transforms: &[Mat4],
        geometries: &[GeometryHandle],
        descriptors: &[DescriptorsHandle],
        overlay: &mut Overlay<'_>,
    ) -> Result<FrameStatus>;

    /// The window changed size; the surface is rebuilt before the next acquire
    fn resize(&mut self, width: u32, height: u32);

    fn wait_idle(&self) -> Result<()>;

    /// Counters of the last rendered frame
    fn stats(&self) -> RenderStats;

    /// `create_image`, substituting the placeholder when `pixels` is missing or unusable
    fn create_image_or_fallback(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channels: u32,
        pixels: Option<&[u8]>,
    ) -> Result<ImageHandle> {
        if let Some(pixels) = pixels {
            match self.create_image(name, width, height, channels, pixels) {
                Ok(handle) => return Ok(handle),
                Err(e) => render_warn!("tandem::images", "Image '{}' unusable ({}), using placeholder", name, e),
            }
        } else {
            render_warn!("tandem::images", "Image '{}' has no pixels, using placeholder", name);
        }
        self.create_image(FALLBACK_IMAGE_NAME, 2, 2, IMAGE_CHANNELS, &FALLBACK_IMAGE_PIXELS)
    }
}
