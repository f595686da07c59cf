/// Plain data types shared by both backends: extents, buffer usage classes,
/// the vertex-attribute schema and the per-draw push-constant block.

use crate::error::Result;
use crate::render_precondition;
use glam::{Mat4, Vec3, Vec4};

/// Bytes per pixel of every image (RGBA, 8 bits per channel)
pub const IMAGE_CHANNELS: u32 = 4;

/// 2D extent in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True while a window is minimized; nothing can be presented
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, 1.0 for a zero-area extent
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_zero_area() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Usage class of a device buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Interleaved vertex data laid out per a pipeline's attribute schema
    Vertex,
    /// 16 or 32-bit indices
    Index,
}

/// Element type of an index buffer, derived from its stride
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Map an index buffer stride to its index type
    pub fn from_stride(stride: u32) -> Option<Self> {
        match stride {
            2 => Some(IndexType::U16),
            4 => Some(IndexType::U32),
            _ => None,
        }
    }
}

/// Vertex attribute format (one entry of an attribute schema)
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    /// 3 x f32 (positions, normals)
    VEC3_FLOAT,
    /// 2 x f32 (texture coordinates)
    VEC2_FLOAT,
}

impl AttributeFormat {
    /// Size in bytes of one attribute of this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            AttributeFormat::VEC3_FLOAT => 12,
            AttributeFormat::VEC2_FLOAT => 8,
        }
    }

    /// Number of f32 components
    pub fn component_count(&self) -> u32 {
        match self {
            AttributeFormat::VEC3_FLOAT => 3,
            AttributeFormat::VEC2_FLOAT => 2,
        }
    }
}

/// One attribute placed inside an interleaved vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location (schema position)
    pub location: u32,
    pub format: AttributeFormat,
    /// Byte offset inside a vertex
    pub offset: u32,
}

/// Interleaved vertex layout derived from an attribute schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    /// Walk the schema in order, packing attributes with no gaps.
    /// The accumulated size is the per-vertex stride.
    pub fn from_schema(schema: &[AttributeFormat]) -> Result<Self> {
        if schema.is_empty() {
            return Err(render_precondition!("tandem::layout", "Vertex attribute schema is empty"));
        }

        let mut offset = 0u32;
        let attributes = schema
            .iter()
            .enumerate()
            .map(|(location, &format)| {
                let attribute = VertexAttribute {
                    location: location as u32,
                    format,
                    offset,
                };
                offset += format.size_bytes();
                attribute
            })
            .collect();

        Ok(Self { attributes, stride: offset })
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }
}

/// Per-draw constants: `{model: mat4, view: mat4, color: vec3}`
///
/// The color is padded to a vec4 so the block has no implicit padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PushConstants {
    pub model: Mat4,
    pub view: Mat4,
    pub color: Vec4,
}

impl PushConstants {
    /// Size of the block as declared to the explicit backend
    pub const SIZE: u32 = std::mem::size_of::<PushConstants>() as u32;

    pub fn new(model: Mat4, view: Mat4, color: Vec3) -> Self {
        Self {
            model,
            view,
            color: color.extend(1.0),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
