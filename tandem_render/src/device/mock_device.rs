/// Mock backend for unit tests (no GPU)
///
/// - `MockSurface` simulates fences on a GPU timeline and records every call
/// - `MockRecorder` records draw commands as values
/// - `MockDevice` is a full `RenderDevice` built from the shared core pieces

use std::collections::VecDeque;
use std::time::Duration;

use glam::{Mat4, Vec3};

use crate::config::{Config, MAX_FRAMES_IN_FLIGHT};
use crate::device::command_recorder::{record_batch, CommandRecorder, GpuTypes};
use crate::device::mipmap::mip_level_count;
use crate::device::render_device::{FrameStatus, Overlay, OverlayTarget, RenderDevice, RenderStats};
use crate::device::types::{AttributeFormat, BufferUsage, Extent2D, PushConstants, VertexLayout};
use crate::error::{Error, Result};
use crate::frame::frame_driver::drive_frame;
use crate::frame::frame_sync::FrameSynchronizer;
use crate::frame::present_surface::{AcquireOutcome, PresentOutcome, PresentSurface};
use crate::registry::handle::{BufferHandle, DescriptorsHandle, GeometryHandle, ImageHandle, PipelineHandle};
use crate::registry::image_cache::check_image_payload;
use crate::registry::resource_tables::{
    BufferRecord, DescriptorsRecord, GeometryRecord, PipelineRecord, ResolvedDraw, ResourceTables,
};

// ============================================================================
// MOCK TYPES
// ============================================================================

pub(crate) struct MockTypes;

impl GpuTypes for MockTypes {
    type Buffer = String;
    type Image = String;
    type Pipeline = String;
    type Descriptors = String;
    type VertexInput = ();
}

// ============================================================================
// MOCK RECORDER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RecordedCommand {
    BeginPass { image_index: u32 },
    BindPipeline(String),
    BindDescriptors(String),
    PushConstants(PushConstants),
    BindGeometry { vertex: String, index: String },
    DrawIndexed(u32),
    Overlay,
    EndPass,
}

#[derive(Default)]
pub(crate) struct MockRecorder {
    pub commands: Vec<RecordedCommand>,
}

impl CommandRecorder<MockTypes> for MockRecorder {
    fn bind_pipeline(&mut self, pipeline: &PipelineRecord<String>) -> Result<()> {
        self.commands.push(RecordedCommand::BindPipeline(pipeline.gpu.clone()));
        Ok(())
    }

    fn bind_descriptors(&mut self, _pipeline: &PipelineRecord<String>, descriptors: &DescriptorsRecord<String>) -> Result<()> {
        self.commands.push(RecordedCommand::BindDescriptors(descriptors.gpu.clone()));
        Ok(())
    }

    fn push_constants(&mut self, _pipeline: &PipelineRecord<String>, constants: &PushConstants) -> Result<()> {
        self.commands.push(RecordedCommand::PushConstants(*constants));
        Ok(())
    }

    fn bind_geometry(&mut self, draw: &ResolvedDraw<'_, MockTypes>) -> Result<()> {
        self.commands.push(RecordedCommand::BindGeometry {
            vertex: draw.vertex_buffer.gpu.clone(),
            index: draw.index_buffer.gpu.clone(),
        });
        Ok(())
    }

    fn draw_indexed(&mut self, _draw: &ResolvedDraw<'_, MockTypes>, index_count: u32) -> Result<()> {
        self.commands.push(RecordedCommand::DrawIndexed(index_count));
        Ok(())
    }
}

// ============================================================================
// MOCK SURFACE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SurfaceEvent {
    Wait { slot: usize, blocked: bool },
    Acquire { slot: usize, outcome: AcquireOutcome },
    Reset { slot: usize },
    Submit { slot: usize, image_index: u32 },
    Present { slot: usize, image_index: u32 },
    Abandon { slot: usize },
    DestroyFramebuffers,
    DestroyDepth,
    DestroySwapchain,
    CreateSwapchain(Extent2D),
    CreateDepth(Extent2D),
    CreateFramebuffers { count: u32, extent: Extent2D },
}

/// Fence state of one slot on the simulated GPU timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FenceState {
    /// Signalled, nothing pending
    Signaled,
    /// Reset on the CPU, nothing submitted yet
    Reset,
    /// Submitted work the GPU has not finished
    Pending,
}

pub(crate) struct MockSurface {
    pub events: Vec<SurfaceEvent>,
    pub fences: [FenceState; MAX_FRAMES_IN_FLIGHT],
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub extent: Extent2D,
    /// Size the window will have at the next rebuild
    pub window_extent: Extent2D,
    pub image_count: u32,
    next_image: u32,
    pub acquire_script: VecDeque<AcquireOutcome>,
    pub present_script: VecDeque<PresentOutcome>,
    /// Returned, once, by the next `submit` (the fence stays reset)
    pub submit_failure: Option<Error>,
    /// Returned, once, by the next `present`
    pub present_failure: Option<Error>,
    pub last_timeout: Option<Duration>,
}

impl MockSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            events: Vec::new(),
            fences: [FenceState::Signaled; MAX_FRAMES_IN_FLIGHT],
            in_flight: 0,
            max_in_flight: 0,
            extent: Extent2D::new(width, height),
            window_extent: Extent2D::new(width, height),
            image_count: 3,
            next_image: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            submit_failure: None,
            present_failure: None,
            last_timeout: None,
        }
    }

    pub fn count(&self, pred: impl Fn(&SurfaceEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl PresentSurface for MockSurface {
    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        match self.fences[slot] {
            FenceState::Signaled => {
                self.events.push(SurfaceEvent::Wait { slot, blocked: false });
            }
            FenceState::Pending => {
                // The CPU blocks until the GPU retires this slot
                self.events.push(SurfaceEvent::Wait { slot, blocked: true });
                self.fences[slot] = FenceState::Signaled;
                self.in_flight -= 1;
            }
            FenceState::Reset => {
                return Err(Error::BackendError(format!(
                    "deadlock: slot {} fence was reset with nothing submitted",
                    slot
                )));
            }
        }
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize, timeout: Option<Duration>) -> Result<AcquireOutcome> {
        self.last_timeout = timeout;
        let outcome = self.acquire_script.pop_front().unwrap_or_else(|| {
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            AcquireOutcome::Acquired { image_index, suboptimal: false }
        });
        self.events.push(SurfaceEvent::Acquire { slot, outcome });
        Ok(outcome)
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        if self.fences[slot] != FenceState::Signaled {
            return Err(Error::BackendError(format!("slot {} reset while its fence is unsignaled", slot)));
        }
        self.fences[slot] = FenceState::Reset;
        self.events.push(SurfaceEvent::Reset { slot });
        Ok(())
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        if let Some(e) = self.submit_failure.take() {
            return Err(e);
        }
        self.fences[slot] = FenceState::Pending;
        self.in_flight += 1;
        self.max_in_flight = self.max_in_flight.max(self.in_flight);
        self.events.push(SurfaceEvent::Submit { slot, image_index });
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        if let Some(e) = self.present_failure.take() {
            return Err(e);
        }
        self.events.push(SurfaceEvent::Present { slot, image_index });
        Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn abandon(&mut self, slot: usize, _image_index: u32) -> Result<()> {
        self.fences[slot] = FenceState::Signaled;
        self.events.push(SurfaceEvent::Abandon { slot });
        Ok(())
    }

    fn rebuild(&mut self) -> Result<Extent2D> {
        self.events.push(SurfaceEvent::DestroyFramebuffers);
        self.events.push(SurfaceEvent::DestroyDepth);
        self.events.push(SurfaceEvent::DestroySwapchain);

        self.extent = self.window_extent;
        if self.extent.is_zero_area() {
            return Ok(self.extent);
        }

        self.events.push(SurfaceEvent::CreateSwapchain(self.extent));
        self.events.push(SurfaceEvent::CreateDepth(self.extent));
        self.events.push(SurfaceEvent::CreateFramebuffers {
            count: self.image_count,
            extent: self.extent,
        });
        self.next_image = 0;
        Ok(self.extent)
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }
}

// ============================================================================
// MOCK DEVICE
// ============================================================================

pub(crate) struct MockDevice {
    pub tables: ResourceTables<MockTypes>,
    pub sync: FrameSynchronizer<MockSurface>,
    /// Commands of every recorded frame, in order
    pub frames: Vec<Vec<RecordedCommand>>,
    pub projections: Vec<(PipelineHandle, Mat4)>,
    pub buffer_uploads: u32,
    last_stats: RenderStats,
    next_id: u32,
}

impl MockDevice {
    pub fn new(config: &Config) -> Self {
        Self {
            tables: ResourceTables::new(),
            sync: FrameSynchronizer::new(MockSurface::new(800, 600), config.acquire_timeout),
            frames: Vec::new(),
            projections: Vec::new(),
            buffer_uploads: 0,
            last_stats: RenderStats::default(),
            next_id: 0,
        }
    }

    pub fn surface(&mut self) -> &mut MockSurface {
        self.sync.surface_mut()
    }

    fn name(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}#{}", prefix, self.next_id)
    }
}

impl RenderDevice for MockDevice {
    fn create_buffer(&mut self, usage: BufferUsage, stride: u32, count: u32, data: &[u8]) -> Result<BufferHandle> {
        ResourceTables::<MockTypes>::check_buffer_payload(usage, stride, count, data)?;
        self.buffer_uploads += 1;
        let gpu = self.name("buffer");
        Ok(self.tables.buffers.register(BufferRecord { usage, stride, count, gpu }))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        self.tables.buffers.release(buffer).map(|_| ())
    }

    fn create_image(&mut self, name: &str, width: u32, height: u32, channels: u32, pixels: &[u8]) -> Result<ImageHandle> {
        if let Some(handle) = self.tables.images.lookup(name) {
            return Ok(handle);
        }
        check_image_payload(width, height, channels, pixels)?;
        let gpu = format!("image:{}", name);
        self.tables
            .images
            .get_or_upload(name, Extent2D::new(width, height), || Ok((gpu, mip_level_count(width, height))))
    }

    fn destroy_all_images(&mut self) -> Result<()> {
        self.tables.remove_all_images();
        Ok(())
    }

    fn create_pipeline(&mut self, vertex_shader: &[u8], fragment_shader: &[u8], attributes: &[AttributeFormat]) -> Result<PipelineHandle> {
        if vertex_shader.is_empty() || fragment_shader.is_empty() {
            return Err(Error::ShaderCompilation {
                stage: if vertex_shader.is_empty() { "vertex" } else { "fragment" }.to_string(),
                log: "empty shader".to_string(),
            });
        }
        let layout = VertexLayout::from_schema(attributes)?;
        let gpu = self.name("pipeline");
        Ok(self.tables.pipelines.register(PipelineRecord { layout, gpu }))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        self.tables.remove_pipeline(pipeline).map(|_| ())
    }

    fn update_projection(&mut self, pipeline: PipelineHandle, projection: Mat4) -> Result<()> {
        self.tables.pipelines.get(pipeline)?;
        self.sync.wait_for_in_flight()?;
        self.projections.push((pipeline, projection));
        Ok(())
    }

    fn create_descriptors(&mut self, pipeline: PipelineHandle, image: ImageHandle, color: Vec3) -> Result<DescriptorsHandle> {
        self.tables.check_descriptors(pipeline, image)?;
        let gpu = self.name("descriptors");
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
        let frames = &mut self.frames;
        let status = drive_frame(
            &self.tables,
            &mut self.sync,
            view,
            pipeline,
            transforms,
            geometries,
            descriptors,
            |surface, token, batch| {
                let mut recorder = MockRecorder::default();
                recorder.commands.push(RecordedCommand::BeginPass { image_index: token.image_index() });
                let stats = record_batch(&mut recorder, batch);
                let extent = surface.extent();
                let result = stats.and_then(|stats| {
                    overlay(&OverlayTarget {
                        width: extent.width,
                        height: extent.height,
                        native_command_buffer: None,
                    })?;
                    Ok(stats)
                });
                recorder.commands.push(RecordedCommand::Overlay);
                recorder.commands.push(RecordedCommand::EndPass);
                frames.push(recorder.commands);
                result
            },
        )?;

        if let FrameStatus::Rendered(stats) = status {
            self.last_stats = stats;
        }
        Ok(status)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.sync.surface_mut().window_extent = Extent2D::new(width, height);
        self.sync.request_rebuild();
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> RenderStats {
        self.last_stats
    }
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
