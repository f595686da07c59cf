/// Frame synchronization: the frames-in-flight state machine, the surface
/// trait each backend implements, and the shared `render` driver.

pub mod frame_driver;
pub mod frame_sync;
pub mod present_surface;

pub use frame_driver::drive_frame;
pub use frame_sync::{BeginFrame, FrameSynchronizer, FrameToken};
pub use present_surface::{AcquireOutcome, PresentOutcome, PresentSurface};
