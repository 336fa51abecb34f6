/*!
# Galaxy 3D Index Buffer - Vulkan Backend

Vulkan implementation of the `GraphicsBackend` trait of `galaxy_3d_index_buffer`.

Uses the Ash library for Vulkan bindings and gpu-allocator for memory
management. The backend is headless: it needs no window or surface.

```no_run
use galaxy_3d_index_buffer::galaxy3d::{GraphicsContext, IndexBuffer, Usage};
use galaxy_3d_index_buffer_vulkan::galaxy3d::{Config, VulkanBackend};

let context = GraphicsContext::new(VulkanBackend::new(Config::default())?);
let mut indices = IndexBuffer::with_usage(&context, Usage::Static);
indices.create(6)?;
indices.update(&[0, 1, 2, 2, 3, 0])?;
# Ok::<(), galaxy_3d_index_buffer::galaxy3d::Error>(())
```
*/

mod config;
mod vulkan_context;
mod vulkan_buffer;
mod vulkan_backend;
#[cfg(feature = "vulkan-validation")]
mod debug;

// Main galaxy3d namespace module
pub mod galaxy3d {
    pub use crate::config::{Config, DebugSeverity};
    pub use crate::vulkan_backend::{memory_location, VulkanBackend};
    pub use crate::vulkan_context::GpuContext;

    // Validation statistics (only with the vulkan-validation feature)
    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{print_validation_stats_report, validation_stats, ValidationStats};
}
