/// Device contract and the data types shared by both backends

pub mod command_recorder;
pub mod mipmap;
pub mod render_device;
pub mod types;

#[cfg(test)]
pub(crate) mod mock_device;

pub use command_recorder::{record_batch, CommandRecorder, GpuTypes};
pub use mipmap::{mip_chain, mip_extent, mip_level_count};
pub use render_device::{
    FrameStatus, Overlay, OverlayTarget, RenderDevice, RenderStats, SkipReason, FALLBACK_IMAGE_NAME,
    FALLBACK_IMAGE_PIXELS,
};
pub use types::{
    AttributeFormat, BufferUsage, Extent2D, IndexType, PushConstants, VertexAttribute, VertexLayout,
    IMAGE_CHANNELS,
};
