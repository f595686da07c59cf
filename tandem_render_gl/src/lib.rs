/*!
# Tandem Render - OpenGL Backend

Immediate-mode implementation of the `tandem_render` device contract, built
on glow. The caller creates the context and window (glutin, SDL, ...) and
hands over a `glow::Context` plus a hook that swaps buffers.

Commands execute as they are issued: uploads are plain `glBufferData` /
`glTexImage2D` calls, mipmaps come from `glGenerateMipmap`, and a frame ends
with the swap hook.

```no_run
use tandem_render::tandem::{Config, RenderDevice};
use tandem_render_gl::GlDevice;
# fn demo(gl: glow::Context) -> tandem_render::tandem::Result<()> {
let mut device = GlDevice::new(gl, Box::new(|| Ok(())), 1280, 720, Config::default())?;
device.wait_idle()?;
# Ok(())
# }
```
*/

mod gl_command_list;
mod gl_device;
mod gl_error;
mod gl_shader;
mod gl_surface;
mod gl_texture;

pub use gl_device::{GlDevice, GlTypes};
pub use gl_surface::SwapHook;
