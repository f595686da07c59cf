/// GlSurface - the default framebuffer seen through `PresentSurface`
///
/// GL executes commands as they are issued and the driver paces buffer swaps,
/// so slots, fences and acquires collapse to no-ops. The only real work is the
/// caller's swap hook and tracking the framebuffer size.

use std::time::Duration;
use tandem_render::frame::{AcquireOutcome, PresentOutcome, PresentSurface};
use tandem_render::tandem::render::Extent2D;
use tandem_render::tandem::Result;
use tandem_render::render_trace;

/// Swaps the window's back buffer (e.g. `glutin::surface::Surface::swap_buffers`)
pub type SwapHook = Box<dyn FnMut() -> Result<()>>;

pub(crate) struct GlSurface {
    swap: SwapHook,
    extent: Extent2D,
    window_extent: Extent2D,
    presented: u64,
}

impl GlSurface {
    pub fn new(swap: SwapHook, extent: Extent2D) -> Self {
        Self {
            swap,
            extent,
            window_extent: extent,
            presented: 0,
        }
    }

    pub fn set_window_extent(&mut self, extent: Extent2D) {
        self.window_extent = extent;
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl PresentSurface for GlSurface {
    fn wait_for_slot(&mut self, _slot: usize) -> Result<()> {
        Ok(())
    }

    fn acquire_image(&mut self, _slot: usize, _timeout: Option<Duration>) -> Result<AcquireOutcome> {
        if self.extent.is_zero_area() {
            return Ok(AcquireOutcome::OutOfDate);
        }
        Ok(AcquireOutcome::Acquired { image_index: 0, suboptimal: false })
    }

    fn reset_slot(&mut self, _slot: usize) -> Result<()> {
        Ok(())
    }

    fn submit(&mut self, _slot: usize, _image_index: u32) -> Result<()> {
        Ok(())
    }

    fn present(&mut self, _slot: usize, _image_index: u32) -> Result<PresentOutcome> {
        (self.swap)()?;
        self.presented += 1;

        if self.window_extent != self.extent {
            return Ok(PresentOutcome::Suboptimal);
        }
        Ok(PresentOutcome::Presented)
    }

    fn abandon(&mut self, _slot: usize, _image_index: u32) -> Result<()> {
        Ok(())
    }

    fn rebuild(&mut self) -> Result<Extent2D> {
        render_trace!(
            "tandem::gl",
            "Default framebuffer {}x{} -> {}x{}",
            self.extent.width, self.extent.height, self.window_extent.width, self.window_extent.height
        );
        self.extent = self.window_extent;
        Ok(self.extent)
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }
}

#[cfg(test)]
#[path = "gl_surface_tests.rs"]
mod tests;
