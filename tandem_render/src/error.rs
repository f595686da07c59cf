//! Error types for the Tandem renderer
//!
//! This module defines the error type shared by the core and both backends,
//! covering configuration, precondition, resource and device failures.

use std::fmt;

/// Result type for Tandem renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Tandem renderer errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, OpenGL)
    BackendError(String),

    /// Out of host or device memory while allocating a resource
    OutOfMemory,

    /// Invalid or destroyed resource handle
    InvalidResource(String),

    /// Device construction failed (missing or incompatible driver, no surface support)
    InitializationFailed(String),

    /// Caller broke an operation's contract (mismatched arrays, bad payload size)
    PreconditionFailed(String),

    /// Shader compile or link failure, with the diagnostic text of the failing stage
    ShaderCompilation {
        stage: String,
        log: String,
    },

    /// The fixed descriptor pool has no set left
    DescriptorPoolExhausted {
        capacity: u32,
    },

    /// The device was lost; not recoverable
    DeviceLost,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::PreconditionFailed(msg) => write!(f, "Precondition failed: {}", msg),
            Error::ShaderCompilation { stage, log } => {
                write!(f, "Shader compilation failed ({} stage): {}", stage, log)
            }
            Error::DescriptorPoolExhausted { capacity } => {
                write!(f, "Descriptor pool exhausted (capacity: {} sets)", capacity)
            }
            Error::DeviceLost => write!(f, "Device lost"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
