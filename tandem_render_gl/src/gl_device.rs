/// GlDevice - immediate-mode implementation of `RenderDevice`
///
/// Wraps a caller-created `glow::Context` (current on the calling thread) and
/// a swap hook. Uploads are synchronous, there is no staging and no fence:
/// the driver orders everything on the one context.
///
/// Shaders are GLSL source text. The vertex shader reads attribute `i` of the
/// schema at `layout(location = i)` and declares `mat4 projection, model, view`;
/// the fragment shader declares `vec3 color` and `sampler2D albedo`.

use glow::HasContext;
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
use tandem_render::{render_debug, render_error, render_info};

use crate::gl_command_list::{create_vertex_array, GlRecorder, NativeVertexArray};
use crate::gl_error::{check_error, clear_errors};
use crate::gl_shader::{build_program, Program};
use crate::gl_surface::{GlSurface, SwapHook};
use crate::gl_texture::{upload_buffer, upload_texture, NativeBuffer, NativeTexture};

/// GL object types held in the immediate-mode backend's resource tables
pub struct GlTypes;

impl GpuTypes for GlTypes {
    type Buffer = NativeBuffer;
    type Image = NativeTexture;
    type Pipeline = Program;
    type Descriptors = NativeTexture;
    type VertexInput = NativeVertexArray;
}

pub struct GlDevice {
    gl: glow::Context,
    tables: ResourceTables<GlTypes>,
    sync: FrameSynchronizer<GlSurface>,
    config: Config,
    last_stats: RenderStats,
}

impl GlDevice {
    /// Take over `gl` and draw into its default framebuffer, `width` x `height` pixels.
    /// `swap` is called once per rendered frame.
    pub fn new(gl: glow::Context, swap: SwapHook, width: u32, height: u32, config: Config) -> Result<Self> {
        let version = gl.version();
        if version.major < 3 || (version.major == 3 && version.minor < 3 && !version.is_embedded) {
            return Err(init_failed(format!(
                "OpenGL 3.3 or newer required, context is {}.{}",
                version.major, version.minor
            )));
        }
        render_info!(
            "tandem::gl",
            "OpenGL{} {}.{} ({})",
            if version.is_embedded { " ES" } else { "" },
            version.major,
            version.minor,
            version.vendor_info
        );

        let surface = GlSurface::new(swap, Extent2D::new(width, height));
        Ok(Self {
            gl,
            tables: ResourceTables::new(),
            sync: FrameSynchronizer::new(surface, config.acquire_timeout),
            config,
            last_stats: RenderStats::default(),
        })
    }

    /// Buffer swaps performed so far
    pub fn frames_presented(&self) -> u64 {
        self.sync.surface().presented()
    }

    fn write_projection(&self, program: &Program, projection: &Mat4) {
        unsafe {
            self.gl.use_program(Some(program.program));
            self.gl.uniform_matrix_4_f32_slice(
                program.uniforms.projection.as_ref(),
                false,
                &projection.to_cols_array(),
            );
            self.gl.use_program(None);
        }
    }
}

impl RenderDevice for GlDevice {
    fn create_buffer(&mut self, usage: BufferUsage, stride: u32, count: u32, data: &[u8]) -> Result<BufferHandle> {
        ResourceTables::<GlTypes>::check_buffer_payload(usage, stride, count, data)?;
        let gpu = upload_buffer(&self.gl, usage, data)?;
        Ok(self.tables.buffers.register(BufferRecord { usage, stride, count, gpu }))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        let record = self.tables.buffers.release(buffer)?;
        unsafe { self.gl.delete_buffer(record.gpu) };
        Ok(())
    }

    fn create_image(&mut self, name: &str, width: u32, height: u32, channels: u32, pixels: &[u8]) -> Result<ImageHandle> {
        if let Some(handle) = self.tables.images.lookup(name) {
            render_debug!("tandem::gl", "Image '{}' served from cache", name);
            return Ok(handle);
        }
        check_image_payload(width, height, channels, pixels)?;

        let gl = &self.gl;
        self.tables
            .images
            .get_or_upload(name, Extent2D::new(width, height), || upload_texture(gl, name, width, height, pixels))
    }

    fn destroy_all_images(&mut self) -> Result<()> {
        let (images, _orphans) = self.tables.remove_all_images();
        for image in &images {
            unsafe { self.gl.delete_texture(image.gpu) };
        }
        render_debug!("tandem::gl", "Destroyed {} image(s)", images.len());
        Ok(())
    }

    fn create_pipeline(&mut self, vertex_shader: &[u8], fragment_shader: &[u8], attributes: &[AttributeFormat]) -> Result<PipelineHandle> {
        let layout = VertexLayout::from_schema(attributes)?;
        let program = build_program(&self.gl, vertex_shader, fragment_shader, &layout)?;
        self.write_projection(&program, &gl_projection(&self.config, self.sync.extent()));
        Ok(self.tables.pipelines.register(PipelineRecord { layout, gpu: program }))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        let (record, _orphans) = self.tables.remove_pipeline(pipeline)?;
        unsafe { self.gl.delete_program(record.gpu.program) };
        Ok(())
    }

    fn update_projection(&mut self, pipeline: PipelineHandle, projection: Mat4) -> Result<()> {
        let record = self.tables.pipelines.get(pipeline)?;
        self.write_projection(&record.gpu, &projection);
        Ok(())
    }

    fn create_descriptors(&mut self, pipeline: PipelineHandle, image: ImageHandle, color: Vec3) -> Result<DescriptorsHandle> {
        let (_pipeline, image_record) = self.tables.check_descriptors(pipeline, image)?;
        let gpu = image_record.gpu;
        Ok(self.tables.descriptors.register(DescriptorsRecord { pipeline, image, color, gpu }))
    }

    fn create_geometry(&mut self, pipeline: PipelineHandle, vertex_buffer: BufferHandle, index_buffer: BufferHandle) -> Result<GeometryHandle> {
        let plan = self.tables.plan_geometry(pipeline, vertex_buffer, index_buffer)?;
        let vao = create_vertex_array(&self.gl, &plan.pipeline.layout, plan.vertex_buffer.gpu, plan.index_buffer.gpu)?;
        let record = GeometryRecord {
            pipeline,
            vertex_buffer,
            index_buffer,
            index_count: plan.index_buffer.count,
            index_type: plan.index_type,
            gpu: vao,
        };
        Ok(self.tables.geometries.register(record))
    }

    fn destroy_geometry(&mut self, geometry: GeometryHandle) -> Result<()> {
        let removed = self.tables.remove_geometry(geometry)?;
        unsafe {
            self.gl.delete_vertex_array(removed.geometry.gpu);
            for buffer in [removed.vertex_buffer, removed.index_buffer].into_iter().flatten() {
                self.gl.delete_buffer(buffer.gpu);
            }
        }
        Ok(())
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
        let gl = &self.gl;
        let clear_color = self.config.clear_color;

        let status = drive_frame(
            &self.tables,
            &mut self.sync,
            view,
            pipeline,
            transforms,
            geometries,
            descriptors,
            |surface, _token, batch| {
                let extent = surface.extent();
                let pass = Pass { gl, clear_color };
                pass.begin(extent);

                let mut recorder = GlRecorder::new(gl);
                let stats = record_batch(&mut recorder, batch)?;

                overlay(&OverlayTarget {
                    width: extent.width,
                    height: extent.height,
                    native_command_buffer: None,
                })?;

                pass.end()?;
                Ok(stats)
            },
        )?;

        if let FrameStatus::Rendered(stats) = status {
            self.last_stats = stats;
        }
        Ok(status)
    }

    fn resize(&mut self, width: u32, height: u32) {
        render_debug!("tandem::gl", "Resize to {}x{} requested", width, height);
        self.sync.surface_mut().set_window_extent(Extent2D::new(width, height));
        self.sync.request_rebuild();
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.gl.finish() };
        check_error(&self.gl, "glFinish")
    }

    fn stats(&self) -> RenderStats {
        self.last_stats
    }
}

impl Drop for GlDevice {
    fn drop(&mut self) {
        unsafe {
            self.gl.finish();

            for geometry in self.tables.geometries.drain() {
                self.gl.delete_vertex_array(geometry.gpu);
            }
            self.tables.descriptors.drain();
            for buffer in self.tables.buffers.drain() {
                self.gl.delete_buffer(buffer.gpu);
            }
            for pipeline in self.tables.pipelines.drain() {
                self.gl.delete_program(pipeline.gpu.program);
            }
            for image in self.tables.images.clear() {
                self.gl.delete_texture(image.gpu);
            }
        }
        render_debug!("tandem::gl", "Device destroyed");
    }
}

/// Clear, viewport and fixed-function state of the main pass
struct Pass<'a> {
    gl: &'a glow::Context,
    clear_color: [f32; 4],
}

impl Pass<'_> {
    fn begin(&self, extent: Extent2D) {
        let [r, g, b, a] = self.clear_color;
        clear_errors(self.gl);
        unsafe {
            self.gl.viewport(0, 0, extent.width as i32, extent.height as i32);
            self.gl.enable(glow::FRAMEBUFFER_SRGB);
            self.gl.enable(glow::DEPTH_TEST);
            self.gl.depth_func(glow::LESS);
            self.gl.enable(glow::CULL_FACE);
            self.gl.cull_face(glow::BACK);
            self.gl.front_face(glow::CCW);
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn end(&self) -> Result<()> {
        unsafe {
            self.gl.bind_vertex_array(None);
            self.gl.use_program(None);
        }
        check_error(self.gl, "frame")
    }
}

fn init_failed(message: String) -> Error {
    render_error!("tandem::gl", "{}", message);
    Error::InitializationFailed(message)
}

/// Right-handed perspective with GL's [-1, 1] clip depth
pub(crate) fn gl_projection(config: &Config, extent: Extent2D) -> Mat4 {
    Mat4::perspective_rh_gl(
        config.fov_y_degrees.to_radians(),
        extent.aspect_ratio(),
        config.near_plane,
        config.far_plane,
    )
}

#[cfg(test)]
#[path = "gl_device_tests.rs"]
mod tests;
