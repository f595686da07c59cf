/// GLSL programs
///
/// Each stage is compiled from source text and linked into one program. A
/// failing stage or link reports the driver's info log as
/// `Error::ShaderCompilation` and leaves no GL objects behind.

use glow::HasContext;
use tandem_render::tandem::render::VertexLayout;
use tandem_render::tandem::{Error, Result};
use tandem_render::{render_debug, render_error, render_warn};

pub(crate) type NativeProgram = <glow::Context as HasContext>::Program;
pub(crate) type NativeShader = <glow::Context as HasContext>::Shader;
pub(crate) type NativeUniform = <glow::Context as HasContext>::UniformLocation;

pub(crate) const PROJECTION_UNIFORM: &str = "projection";
pub(crate) const MODEL_UNIFORM: &str = "model";
pub(crate) const VIEW_UNIFORM: &str = "view";
pub(crate) const COLOR_UNIFORM: &str = "color";
pub(crate) const ALBEDO_UNIFORM: &str = "albedo";

/// Texture unit the albedo sampler reads from
pub(crate) const ALBEDO_UNIT: u32 = 0;

/// Uniform locations a draw writes. Absent ones were optimized out by the driver.
pub struct Uniforms {
    pub(crate) projection: Option<NativeUniform>,
    pub(crate) model: Option<NativeUniform>,
    pub(crate) view: Option<NativeUniform>,
    pub(crate) color: Option<NativeUniform>,
    pub(crate) albedo: Option<NativeUniform>,
}

/// A linked program and its uniform locations
pub struct Program {
    pub(crate) program: NativeProgram,
    pub(crate) uniforms: Uniforms,
}

/// Shader bytes as GLSL text. Trailing NULs (C-string sources) are dropped.
pub(crate) fn shader_source<'a>(stage: &str, bytes: &'a [u8]) -> Result<&'a str> {
    let text = std::str::from_utf8(bytes).map_err(|e| shader_error(stage, format!("source is not UTF-8: {}", e)))?;
    let text = text.trim_end_matches('\0');
    if text.trim().is_empty() {
        return Err(shader_error(stage, "empty source".to_string()));
    }
    Ok(text)
}

pub(crate) fn shader_error(stage: &str, log: String) -> Error {
    render_error!("tandem::gl", "{} shader rejected: {}", stage, log);
    Error::ShaderCompilation { stage: stage.to_string(), log }
}

fn compile_stage(gl: &glow::Context, kind: u32, stage: &str, bytes: &[u8]) -> Result<NativeShader> {
    let source = shader_source(stage, bytes)?;
    unsafe {
        let shader = gl.create_shader(kind).map_err(|e| shader_error(stage, e))?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(shader_error(stage, log));
        }
        Ok(shader)
    }
}

/// Compile both stages and link them.
///
/// Attribute `i` of `layout` is bound to location `i`, matching
/// `layout(location = i)` declarations in the vertex shader.
pub(crate) fn build_program(
    gl: &glow::Context,
    vertex_shader: &[u8],
    fragment_shader: &[u8],
    layout: &VertexLayout,
) -> Result<Program> {
    let vs = compile_stage(gl, glow::VERTEX_SHADER, "vertex", vertex_shader)?;
    let fs = match compile_stage(gl, glow::FRAGMENT_SHADER, "fragment", fragment_shader) {
        Ok(fs) => fs,
        Err(e) => {
            unsafe { gl.delete_shader(vs) };
            return Err(e);
        }
    };

    unsafe {
        let program = match gl.create_program() {
            Ok(program) => program,
            Err(e) => {
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                return Err(shader_error("link", e));
            }
        };
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(shader_error("link", log));
        }

        let active_attributes = gl.get_active_attributes(program);
        if active_attributes as usize > layout.attributes().len() {
            render_warn!(
                "tandem::gl",
                "Vertex shader reads {} attributes, the schema supplies {}",
                active_attributes,
                layout.attributes().len()
            );
        }

        let uniforms = Uniforms {
            projection: gl.get_uniform_location(program, PROJECTION_UNIFORM),
            model: gl.get_uniform_location(program, MODEL_UNIFORM),
            view: gl.get_uniform_location(program, VIEW_UNIFORM),
            color: gl.get_uniform_location(program, COLOR_UNIFORM),
            albedo: gl.get_uniform_location(program, ALBEDO_UNIFORM),
        };
        for (name, location) in [
            (PROJECTION_UNIFORM, &uniforms.projection),
            (MODEL_UNIFORM, &uniforms.model),
            (VIEW_UNIFORM, &uniforms.view),
        ] {
            if location.is_none() {
                render_warn!("tandem::gl", "Program has no active '{}' uniform", name);
            }
        }

        // Sampler units never change, set once
        gl.use_program(Some(program));
        gl.uniform_1_i32(uniforms.albedo.as_ref(), ALBEDO_UNIT as i32);
        gl.use_program(None);

        render_debug!("tandem::gl", "Linked program with {} attribute(s)", layout.attributes().len());
        Ok(Program { program, uniforms })
    }
}

#[cfg(test)]
#[path = "gl_shader_tests.rs"]
mod tests;
