/// Opaque handles returned by a device.
///
/// Handles are generational keys: a released slot is reused with a new
/// generation, so a stale handle never aliases the resource that took its slot.
/// `Default::default()` is the null handle and is never valid.

use slotmap::new_key_type;

new_key_type! {
    /// Device buffer (vertex or index data)
    pub struct BufferHandle;
    /// Cached device image
    pub struct ImageHandle;
    /// Compiled shader pipeline with its vertex layout
    pub struct PipelineHandle;
    /// Per-drawable binding set (texture + color tint)
    pub struct DescriptorsHandle;
    /// Drawable unit (vertex buffer + index buffer + index count)
    pub struct GeometryHandle;
}
