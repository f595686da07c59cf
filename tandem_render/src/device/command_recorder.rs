/// CommandRecorder - the seam between batch recording and a backend
///
/// `record_batch` owns the draw loop (bind the pipeline once, then per draw:
/// descriptors, push constants, vertex/index buffers, indexed draw). Backends
/// only translate each step into API calls.

use crate::device::render_device::RenderStats;
use crate::device::types::PushConstants;
use crate::error::Result;
use crate::registry::resource_tables::{DescriptorsRecord, PipelineRecord, ResolvedBatch, ResolvedDraw};

/// Backend GPU object types stored in the resource tables
pub trait GpuTypes {
    type Buffer;
    type Image;
    type Pipeline;
    type Descriptors;
    /// Per-geometry vertex input state (`()` when the backend binds buffers directly)
    type VertexInput;
}

/// Records (or, on an immediate-mode backend, executes) draw commands
pub trait CommandRecorder<T: GpuTypes> {
    fn bind_pipeline(&mut self, pipeline: &PipelineRecord<T::Pipeline>) -> Result<()>;

    fn bind_descriptors(
        &mut self,
        pipeline: &PipelineRecord<T::Pipeline>,
        descriptors: &DescriptorsRecord<T::Descriptors>,
    ) -> Result<()>;

    fn push_constants(&mut self, pipeline: &PipelineRecord<T::Pipeline>, constants: &PushConstants) -> Result<()>;

    /// Bind the vertex and index buffers of one draw
    fn bind_geometry(&mut self, draw: &ResolvedDraw<'_, T>) -> Result<()>;

    fn draw_indexed(&mut self, draw: &ResolvedDraw<'_, T>, index_count: u32) -> Result<()>;
}

/// Record a resolved batch
pub fn record_batch<T, R>(recorder: &mut R, batch: &ResolvedBatch<'_, T>) -> Result<RenderStats>
where
    T: GpuTypes,
    R: CommandRecorder<T> + ?Sized,
{
    let mut stats = RenderStats::default();

    recorder.bind_pipeline(batch.pipeline)?;

    for draw in &batch.draws {
        recorder.bind_descriptors(batch.pipeline, draw.descriptors)?;
        recorder.push_constants(
            batch.pipeline,
            &PushConstants::new(draw.model, batch.view, draw.descriptors.color),
        )?;
        recorder.bind_geometry(draw)?;
        recorder.draw_indexed(draw, draw.geometry.index_count)?;

        stats.draw_calls += 1;
        stats.triangles += u64::from(draw.geometry.index_count / 3);
    }

    Ok(stats)
}
