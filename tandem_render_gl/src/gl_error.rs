/// GL error queue
///
/// GL reports failures out of band through `glGetError`. Creation paths clear
/// the queue before issuing their calls and check it after, so an error is
/// charged to the call that raised it.

use glow::HasContext;
use tandem_render::tandem::{Error, Result};
use tandem_render::{render_err, render_error};

/// Discard errors raised before the calls about to be checked
///
/// Bounded: a lost context may keep reporting an error forever.
pub(crate) fn clear_errors(gl: &glow::Context) {
    for _ in 0..16 {
        if unsafe { gl.get_error() } == glow::NO_ERROR {
            break;
        }
    }
}

/// Drain the GL error queue, failing on the first error found
pub(crate) fn check_error(gl: &glow::Context, context: &str) -> Result<()> {
    let code = unsafe { gl.get_error() };
    if code == glow::NO_ERROR {
        return Ok(());
    }
    // Later errors in the queue describe the same failure
    clear_errors(gl);
    Err(error_for_code(code, context))
}

/// Log `code` and turn it into the matching `Error`
pub(crate) fn error_for_code(code: u32, context: &str) -> Error {
    if code == glow::OUT_OF_MEMORY {
        render_error!("tandem::gl", "{} failed with GL_OUT_OF_MEMORY", context);
        return Error::OutOfMemory;
    }
    render_err!("tandem::gl", "{} failed with {}", context, gl_error_name(code))
}

pub(crate) fn gl_error_name(code: u32) -> &'static str {
    match code {
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        _ => "unknown GL error",
    }
}
