/// GlRecorder - executes a batch as it is recorded
///
/// Push constants become plain uniforms, descriptors become a texture bound
/// to the albedo unit, and each geometry is one vertex array object.

use glow::HasContext;
use tandem_render::tandem::registry::{DescriptorsRecord, PipelineRecord, ResolvedDraw};
use tandem_render::tandem::render::{CommandRecorder, IndexType, PushConstants, VertexLayout};
use tandem_render::tandem::Result;
use tandem_render::render_err;

use crate::gl_device::GlTypes;
use crate::gl_error::{check_error, clear_errors};
use crate::gl_shader::{Program, ALBEDO_UNIT};
use crate::gl_texture::{NativeBuffer, NativeTexture};

pub(crate) type NativeVertexArray = <glow::Context as HasContext>::VertexArray;

pub(crate) struct GlRecorder<'a> {
    gl: &'a glow::Context,
}

impl<'a> GlRecorder<'a> {
    pub fn new(gl: &'a glow::Context) -> Self {
        Self { gl }
    }
}

impl CommandRecorder<GlTypes> for GlRecorder<'_> {
    fn bind_pipeline(&mut self, pipeline: &PipelineRecord<Program>) -> Result<()> {
        unsafe { self.gl.use_program(Some(pipeline.gpu.program)) };
        Ok(())
    }

    fn bind_descriptors(&mut self, _pipeline: &PipelineRecord<Program>, descriptors: &DescriptorsRecord<NativeTexture>) -> Result<()> {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + ALBEDO_UNIT);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(descriptors.gpu));
        }
        Ok(())
    }

    fn push_constants(&mut self, pipeline: &PipelineRecord<Program>, constants: &PushConstants) -> Result<()> {
        let uniforms = &pipeline.gpu.uniforms;
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(uniforms.model.as_ref(), false, &constants.model.to_cols_array());
            self.gl
                .uniform_matrix_4_f32_slice(uniforms.view.as_ref(), false, &constants.view.to_cols_array());
            self.gl.uniform_3_f32(
                uniforms.color.as_ref(),
                constants.color.x,
                constants.color.y,
                constants.color.z,
            );
        }
        Ok(())
    }

    fn bind_geometry(&mut self, draw: &ResolvedDraw<'_, GlTypes>) -> Result<()> {
        unsafe { self.gl.bind_vertex_array(Some(draw.geometry.gpu)) };
        Ok(())
    }

    fn draw_indexed(&mut self, draw: &ResolvedDraw<'_, GlTypes>, index_count: u32) -> Result<()> {
        let count = i32::try_from(index_count)
            .map_err(|_| render_err!("tandem::gl", "Index count {} exceeds GLsizei", index_count))?;
        unsafe {
            self.gl
                .draw_elements(glow::TRIANGLES, count, index_type_to_gl(draw.geometry.index_type), 0);
        }
        Ok(())
    }
}

pub(crate) fn index_type_to_gl(index_type: IndexType) -> u32 {
    match index_type {
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

/// Arguments of one `glVertexAttribPointer` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttribPointer {
    pub index: u32,
    pub size: i32,
    pub stride: i32,
    pub offset: i32,
}

pub(crate) fn attribute_pointers(layout: &VertexLayout) -> Vec<AttribPointer> {
    layout
        .attributes()
        .iter()
        .map(|attribute| AttribPointer {
            index: attribute.location,
            size: attribute.format.component_count() as i32,
            stride: layout.stride() as i32,
            offset: attribute.offset as i32,
        })
        .collect()
}

/// Vertex array capturing the attribute pointers into `vertex_buffer` and the
/// `index_buffer` binding
pub(crate) fn create_vertex_array(
    gl: &glow::Context,
    layout: &VertexLayout,
    vertex_buffer: NativeBuffer,
    index_buffer: NativeBuffer,
) -> Result<NativeVertexArray> {
    unsafe {
        let vao = gl
            .create_vertex_array()
            .map_err(|e| render_err!("tandem::gl", "Failed to create vertex array: {}", e))?;

        clear_errors(gl);
        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
        for pointer in attribute_pointers(layout) {
            gl.enable_vertex_attrib_array(pointer.index);
            gl.vertex_attrib_pointer_f32(pointer.index, pointer.size, glow::FLOAT, false, pointer.stride, pointer.offset);
        }
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(index_buffer));

        gl.bind_vertex_array(None);
        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        if let Err(e) = check_error(gl, "Vertex array setup") {
            gl.delete_vertex_array(vao);
            return Err(e);
        }
        Ok(vao)
    }
}

#[cfg(test)]
#[path = "gl_command_list_tests.rs"]
mod tests;
