/// FrameSynchronizer - frames-in-flight state machine
///
/// Per slot i in [0, MAX_FRAMES_IN_FLIGHT):
/// wait fence[i] -> acquire -> reset fence[i] and command buffer[i] -> record
/// -> submit -> present -> advance. The fence wait is the only backpressure.
///
/// The fence is reset after a successful acquire rather than before: an acquire
/// that reports out-of-date abandons the frame, and a fence reset with no
/// submission behind it would never signal again.

use std::time::Duration;

use crate::config::MAX_FRAMES_IN_FLIGHT;
use crate::device::render_device::SkipReason;
use crate::device::types::Extent2D;
use crate::error::Result;
use crate::frame::present_surface::{AcquireOutcome, PresentOutcome, PresentSurface};
use crate::{render_debug, render_info, render_warn};

/// A held swapchain image. Only valid between acquire and present, and
/// consumed by `end_frame` or `abandon_frame`.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameToken {
    slot: usize,
    image_index: u32,
}

impl FrameToken {
    /// Frame-in-flight slot (command buffer, fence and semaphore index)
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Swapchain image (framebuffer index)
    pub fn image_index(&self) -> u32 {
        self.image_index
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BeginFrame {
    Ready(FrameToken),
    Skipped(SkipReason),
}

pub struct FrameSynchronizer<S: PresentSurface> {
    surface: S,
    current_frame: usize,
    acquire_timeout: Option<Duration>,
    rebuild_pending: bool,
}

impl<S: PresentSurface> FrameSynchronizer<S> {
    pub fn new(surface: S, acquire_timeout: Option<Duration>) -> Self {
        Self {
            surface,
            current_frame: 0,
            acquire_timeout,
            rebuild_pending: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn extent(&self) -> Extent2D {
        self.surface.extent()
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Rebuild before the next acquire (window resized)
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    /// Wait for this slot, then acquire an image
    pub fn begin_frame(&mut self) -> Result<BeginFrame> {
        let slot = self.current_frame;

        if self.rebuild_pending && !self.rebuild()? {
            return Ok(BeginFrame::Skipped(SkipReason::Minimized));
        }

        self.surface.wait_for_slot(slot)?;

        match self.surface.acquire_image(slot, self.acquire_timeout)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    render_debug!("tandem::frame", "Acquire reported suboptimal surface, rebuilding after present");
                    self.rebuild_pending = true;
                }
                self.surface.reset_slot(slot)?;
                Ok(BeginFrame::Ready(FrameToken { slot, image_index }))
            }
            AcquireOutcome::OutOfDate => {
                render_info!("tandem::frame", "Surface out of date on acquire, rebuilding");
                if self.rebuild()? {
                    Ok(BeginFrame::Skipped(SkipReason::SurfaceRebuilt))
                } else {
                    Ok(BeginFrame::Skipped(SkipReason::Minimized))
                }
            }
            AcquireOutcome::Timeout => {
                render_debug!("tandem::frame", "Acquire timed out on slot {}, skipping frame", slot);
                Ok(BeginFrame::Skipped(SkipReason::AcquireTimeout))
            }
        }
    }

    /// Submit and present a recorded frame, then advance to the next slot
    ///
    /// The slot advances even when submit or present fails. A failed submit
    /// leaves the fence reset with nothing behind it, so the frame is abandoned
    /// to re-arm it before the error is returned.
    pub fn end_frame(&mut self, token: FrameToken) -> Result<()> {
        if let Err(e) = self.surface.submit(token.slot, token.image_index) {
            render_warn!("tandem::frame", "Submit failed on slot {}, abandoning frame", token.slot);
            if let Err(release) = self.surface.abandon(token.slot, token.image_index) {
                render_warn!("tandem::frame", "Could not release slot {} after failed submit: {}", token.slot, release);
            }
            self.rebuild_pending = true;
            self.advance();
            return Err(e);
        }

        let outcome = self.surface.present(token.slot, token.image_index);
        self.advance();

        match outcome {
            Ok(PresentOutcome::Presented) => {}
            Ok(PresentOutcome::Suboptimal | PresentOutcome::OutOfDate) => {
                render_debug!("tandem::frame", "Present reported a stale surface, rebuilding before next acquire");
                self.rebuild_pending = true;
            }
            Err(e) => {
                render_warn!("tandem::frame", "Present failed on slot {}, rebuilding before next acquire", token.slot);
                self.rebuild_pending = true;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Block until every slot's submitted work has finished
    ///
    /// Call between frames only; no slot may be holding a reset fence.
    pub fn wait_for_in_flight(&mut self) -> Result<()> {
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            self.surface.wait_for_slot(slot)?;
        }
        Ok(())
    }

    /// Give up on a frame whose recording failed
    ///
    /// The slot's fence is re-armed by the surface. The acquired image is never
    /// presented, so the surface is rebuilt before the next acquire to get it back.
    pub fn abandon_frame(&mut self, token: FrameToken) -> Result<()> {
        self.surface.abandon(token.slot, token.image_index)?;
        self.rebuild_pending = true;
        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    /// Returns false while the surface has no area
    fn rebuild(&mut self) -> Result<bool> {
        let extent = self.surface.rebuild()?;
        if extent.is_zero_area() {
            self.rebuild_pending = true;
            return Ok(false);
        }
        render_info!("tandem::frame", "Surface rebuilt at {}x{}", extent.width, extent.height);
        self.rebuild_pending = false;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
