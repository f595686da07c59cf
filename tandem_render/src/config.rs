//! Device configuration

use std::time::Duration;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Configuration passed to a device at construction
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,

    /// Enable validation layers (explicit backend, needs the `vulkan-validation` feature)
    pub enable_validation: bool,

    /// Upper bound on a swapchain image acquire. `None` waits forever.
    /// On expiry the frame is skipped and the swapchain is left alone.
    pub acquire_timeout: Option<Duration>,

    /// Fixed capacity of the descriptor pool. Exceeding it is a configuration error.
    pub max_descriptor_sets: u32,

    /// Clear color of the main pass (RGBA)
    pub clear_color: [f32; 4],

    /// Vertical field of view used to seed pipeline projections
    pub fov_y_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,

    /// FIFO presentation when true, MAILBOX (if supported) when false
    pub vsync: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Tandem Application".to_string(),
            enable_validation: false,
            acquire_timeout: None,
            max_descriptor_sets: 1024,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            fov_y_degrees: 45.0,
            near_plane: 0.1,
            far_plane: 100.0,
            vsync: true,
        }
    }
}

impl Config {
    /// Acquire timeout in nanoseconds, `u64::MAX` when unbounded
    pub fn acquire_timeout_ns(&self) -> u64 {
        match self.acquire_timeout {
            Some(timeout) => u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX),
            None => u64::MAX,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
