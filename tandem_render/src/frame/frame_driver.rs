/// One `render` call, shared by both backends.
///
/// Resolve the batch (fails before touching the GPU), begin a frame, let the
/// backend record into it, then submit and present. A frame whose recording
/// fails is abandoned so its slot stays usable.

use glam::Mat4;

use crate::device::command_recorder::GpuTypes;
use crate::device::render_device::{FrameStatus, RenderStats};
use crate::error::Result;
use crate::frame::frame_sync::{BeginFrame, FrameSynchronizer, FrameToken};
use crate::frame::present_surface::PresentSurface;
use crate::registry::handle::{DescriptorsHandle, GeometryHandle, PipelineHandle};
use crate::registry::resource_tables::{ResolvedBatch, ResourceTables};
use crate::render_warn;

#[allow(clippy::too_many_arguments)]
pub fn drive_frame<T, S, F>(
    tables: &ResourceTables<T>,
    sync: &mut FrameSynchronizer<S>,
    view: &Mat4,
    pipeline: PipelineHandle,
    transforms: &[Mat4],
    geometries: &[GeometryHandle],
    descriptors: &[DescriptorsHandle],
    record: F,
) -> Result<FrameStatus>
where
    T: GpuTypes,
    S: PresentSurface,
    F: FnOnce(&mut S, &FrameToken, &ResolvedBatch<'_, T>) -> Result<RenderStats>,
{
    let batch = tables.resolve_batch(view, pipeline, transforms, geometries, descriptors)?;

    let token = match sync.begin_frame()? {
        BeginFrame::Ready(token) => token,
        BeginFrame::Skipped(reason) => return Ok(FrameStatus::Skipped(reason)),
    };

    match record(sync.surface_mut(), &token, &batch) {
        Ok(stats) => {
            sync.end_frame(token)?;
            Ok(FrameStatus::Rendered(stats))
        }
        Err(e) => {
            render_warn!("tandem::frame", "Recording failed, abandoning frame on slot {}", token.slot());
            sync.abandon_frame(token)?;
            Err(e)
        }
    }
}
