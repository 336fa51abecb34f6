//! Error types for the Galaxy3D index buffer
//!
//! Every fallible buffer operation returns [`Result`]. An `Ok` means the
//! operation was applied; an `Err` means it was not. Validation errors leave
//! the buffer exactly as it was. Errors raised after a reallocation (a
//! growing `update_range`, a resizing `copy_from`) and [`Error::UnmapFailed`]
//! leave the new capacity with unspecified contents; each operation's
//! `# Errors` section says which case applies.

use std::fmt;

/// Result type for Galaxy3D index buffer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D index buffer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The backend reports that index buffers are not supported
    FeatureUnavailable,

    /// The backend could not generate a new buffer handle
    HandleGenerationFailed,

    /// The operation needs GPU storage but `create()` was never called
    /// (or the buffer was released with `create(0)`)
    BufferNotCreated,

    /// Caller supplied an unusable argument
    InvalidArgument(String),

    /// A non-zero offset write would go past the current allocation
    CapacityExceeded {
        /// Index offset of the write
        offset: usize,
        /// Number of indices to write
        count: usize,
        /// Current capacity in indices
        capacity: usize,
    },

    /// The backend cannot copy buffer objects at all
    CopyUnsupported,

    /// The backend refused to map a buffer into host memory
    MapFailed,

    /// The backend reported a failure while unmapping.
    ///
    /// The byte copy has already been performed when this is returned, so the
    /// destination may hold partially copied data and should be recreated.
    UnmapFailed,

    /// Backend-specific error (Vulkan, software, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Initialization failed (backend, context)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FeatureUnavailable => write!(f, "Index buffers are not available on this backend"),
            Error::HandleGenerationFailed => write!(f, "Buffer handle generation failed"),
            Error::BufferNotCreated => write!(f, "Index buffer has not been created"),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::CapacityExceeded { offset, count, capacity } => write!(
                f,
                "Write of {} indices at offset {} exceeds capacity {}",
                count, offset, capacity
            ),
            Error::CopyUnsupported => write!(f, "Buffer copies are not supported by this backend"),
            Error::MapFailed => write!(f, "Failed to map buffer memory"),
            Error::UnmapFailed => write!(f, "Failed to unmap buffer memory (contents may be partially copied)"),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
