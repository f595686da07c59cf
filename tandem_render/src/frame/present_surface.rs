/// PresentSurface - the GPU side of the frame cycle
///
/// One implementation per backend. The explicit backend maps each call to
/// fences, semaphores and the swapchain; the immediate-mode backend maps them
/// to no-ops and a buffer swap.

use std::time::Duration;

use crate::device::types::Extent2D;
use crate::error::Result;

/// Result of asking the presentation engine for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready. `suboptimal` asks for a rebuild after this frame.
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface changed under the swapchain; nothing was acquired
    OutOfDate,
    /// No image within the timeout; nothing was acquired
    Timeout,
}

/// Result of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

pub trait PresentSurface {
    /// Block until slot `slot`'s previous submission has finished
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    /// Acquire the next presentable image, signalling slot `slot`'s image-available semaphore
    fn acquire_image(&mut self, slot: usize, timeout: Option<Duration>) -> Result<AcquireOutcome>;

    /// Reset slot `slot`'s fence and command buffer. Only called once an image is held.
    fn reset_slot(&mut self, slot: usize) -> Result<()>;

    /// Submit slot `slot`'s command buffer, signalling its fence on completion
    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;

    /// Give up on a frame whose recording failed after a successful acquire.
    /// Must leave the slot's fence signalled and its semaphore unsignalled.
    fn abandon(&mut self, slot: usize, image_index: u32) -> Result<()>;

    /// Rebuild swapchain, depth buffer and framebuffers as one unit.
    /// Returns the new extent; a zero-area extent means nothing was built.
    fn rebuild(&mut self) -> Result<Extent2D>;

    fn extent(&self) -> Extent2D;
}
