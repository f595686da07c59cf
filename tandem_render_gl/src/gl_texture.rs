/// Texture and buffer uploads
///
/// Synchronous: the driver copies the payload before the call returns.

use glow::{HasContext, PixelUnpackData};
use tandem_render::tandem::render::{mip_level_count, BufferUsage};
use tandem_render::tandem::Result;
use tandem_render::{render_debug, render_err};

use crate::gl_error::{check_error, clear_errors};

pub(crate) type NativeBuffer = <glow::Context as HasContext>::Buffer;
pub(crate) type NativeTexture = <glow::Context as HasContext>::Texture;

/// Bind target of a buffer of `usage`
pub(crate) fn buffer_target(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::Vertex => glow::ARRAY_BUFFER,
        BufferUsage::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

pub(crate) fn upload_buffer(gl: &glow::Context, usage: BufferUsage, bytes: &[u8]) -> Result<NativeBuffer> {
    let target = buffer_target(usage);
    unsafe {
        let buffer = gl
            .create_buffer()
            .map_err(|e| render_err!("tandem::gl", "Failed to create buffer: {}", e))?;

        // An element buffer binds into the current vertex array; keep none bound
        clear_errors(gl);
        gl.bind_vertex_array(None);
        gl.bind_buffer(target, Some(buffer));
        gl.buffer_data_u8_slice(target, bytes, glow::STATIC_DRAW);
        gl.bind_buffer(target, None);
        if let Err(e) = check_error(gl, "glBufferData") {
            gl.delete_buffer(buffer);
            return Err(e);
        }

        render_debug!("tandem::gl", "Uploaded {} bytes ({:?} buffer)", bytes.len(), usage);
        Ok(buffer)
    }
}

/// Upload tightly packed RGBA8 pixels and generate the full mip chain.
/// Returns the texture and its level count.
pub(crate) fn upload_texture(
    gl: &glow::Context,
    name: &str,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<(NativeTexture, u32)> {
    let mip_levels = mip_level_count(width, height);
    unsafe {
        let texture = gl
            .create_texture()
            .map_err(|e| render_err!("tandem::gl", "Failed to create texture '{}': {}", name, e))?;

        clear_errors(gl);
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::SRGB8_ALPHA8 as i32,
            width as i32,
            height as i32,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            PixelUnpackData::Slice(Some(pixels)),
        );
        gl.generate_mipmap(glow::TEXTURE_2D);

        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR_MIPMAP_LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAX_LEVEL, mip_levels as i32 - 1);
        gl.bind_texture(glow::TEXTURE_2D, None);
        if let Err(e) = check_error(gl, &format!("Upload of '{}'", name)) {
            gl.delete_texture(texture);
            return Err(e);
        }

        render_debug!("tandem::gl", "Uploaded '{}' {}x{} with {} mip level(s)", name, width, height, mip_levels);
        Ok((texture, mip_levels))
    }
}
