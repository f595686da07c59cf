/// Resource registry: generational handle tables, the image cache and the
/// per-device resource tables.

pub mod handle;
pub mod image_cache;
#[allow(clippy::module_inception)]
pub mod registry;
pub mod resource_tables;

pub use handle::{BufferHandle, DescriptorsHandle, GeometryHandle, ImageHandle, PipelineHandle};
pub use image_cache::{check_image_payload, ImageCache, ImageRecord};
pub use registry::Registry;
pub use resource_tables::{
    BufferRecord, DescriptorsRecord, GeometryPlan, GeometryRecord, PipelineRecord, RemovedGeometry,
    ResolvedBatch, ResolvedDraw, ResourceTables,
};
