/*!
# Tandem Render

Backend-agnostic core of the Tandem renderer.

A single device contract (`RenderDevice`) is implemented by two backends:
an explicit, fence-synchronized Vulkan backend (`tandem_render_vulkan`) and an
immediate-mode OpenGL backend (`tandem_render_gl`). This crate holds what both
share:

- **Registry**: generational handle tables, the named image cache
- **Layout**: vertex stride/offset derivation, push-constant block, mip math
- **Recording**: the batch draw loop behind the `CommandRecorder` seam
- **Frame**: the frames-in-flight state machine behind the `PresentSurface` seam
- **Log**: pluggable logger and the `render_*!` macros
*/

mod config;
mod error;
pub mod device;
pub mod frame;
pub mod log;
pub mod registry;

pub mod tandem {
    pub use crate::config::{Config, MAX_FRAMES_IN_FLIGHT};
    pub use crate::device::RenderDevice;
    pub use crate::error::{Error, Result};

    // Logging types (the render_* macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, Log, LogEntry, LogSeverity, Logger};
    }

    pub mod render {
        pub use crate::device::*;
    }

    pub mod registry {
        pub use crate::registry::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }
}

pub use glam;
