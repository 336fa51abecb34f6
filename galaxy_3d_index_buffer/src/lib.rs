/*!
# Galaxy 3D Index Buffer

GPU-resident storage for 32-bit vertex indices.

This crate provides the platform-agnostic `IndexBuffer` and the backend trait
it is built on. Backend implementations (the headless software backend in this
crate, Vulkan in `galaxy_3d_index_buffer_vulkan`) declare their capabilities
and are driven through a shared, reentrant graphics context guard.

## Architecture

- **IndexBuffer**: allocation, host uploads, device copies and binding
- **GraphicsContext**: scoped access to a backend plus per-context bound state
- **GraphicsBackend**: buffer-object service implemented by backends
- **Capabilities**: what a backend declares it supports
*/

// Internal modules
mod error;
pub mod log;
pub mod backend;
pub mod context;
pub mod index_buffer;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Context and guard
    pub use crate::context::{ContextGuard, ContextState, GraphicsContext};

    // Index buffer
    pub use crate::index_buffer::IndexBuffer;
    pub use crate::backend::Usage;

    // Logging sub-module (types and sink functions, macros are exported at crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        pub use crate::log::{set_logger, reset_logger, log, log_detailed};
    }

    // Backend sub-module
    pub mod backend {
        pub use crate::backend::*;
    }
}
