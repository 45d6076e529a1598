//! Error types for the shader graph core
//!
//! This module defines the error types used throughout the crate,
//! including device calls, resource management and texture loading.

use std::fmt;

/// Result type for shader graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shader graph errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (software device, GPU backend, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, framebuffer, program, etc.)
    InvalidResource(String),

    /// Initialization failed (surface, device, subsystems)
    InitializationFailed(String),

    /// The device context was lost; every GPU object it owned is gone
    ContextLost,

    /// A pass draw call faulted
    DrawFailed(String),

    /// An asynchronous texture load was rejected
    TextureLoadFailed(String),

    /// A commit referenced a node the surface does not know
    UnknownNode(String),
}

impl Error {
    /// Whether this error means the device context is gone
    pub fn is_context_lost(&self) -> bool {
        matches!(self, Error::ContextLost)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ContextLost => write!(f, "Device context lost"),
            Error::DrawFailed(msg) => write!(f, "Draw failed: {}", msg),
            Error::TextureLoadFailed(msg) => write!(f, "Texture load failed: {}", msg),
            Error::UnknownNode(msg) => write!(f, "Unknown node: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
