/// VulkanBuffer - a vk::Buffer bound to a gpu-allocator allocation

use ash::vk;
use galaxy_3d_index_buffer::galaxy3d::{Error, Result};
use galaxy_3d_index_buffer::{gfx_err, gfx_error};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const SOURCE: &str = "galaxy3d::vulkan";

/// Vulkan buffer with its memory
pub struct VulkanBuffer {
    /// Shared GPU context (device, allocator, queue, command pool)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    /// Buffer size in bytes
    pub(crate) size: u64,
    /// Memory location the allocation was requested in
    pub(crate) location: MemoryLocation,
}

impl VulkanBuffer {
    /// Create a buffer of `size` bytes (> 0) and bind fresh memory to it
    pub fn new(
        ctx: &Arc<GpuContext>,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self> {
        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_create_info, None)
                .map_err(|e| gfx_err!(SOURCE, "Failed to create buffer of size {} bytes: {:?}", size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocated = match ctx.allocator.lock() {
                Ok(mut allocator) => allocator.allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                }),
                Err(_) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(gfx_err!(SOURCE, "GPU allocator lock poisoned"));
                }
            };

            let allocation = match allocated {
                Ok(allocation) => allocation,
                Err(_e) => {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    gfx_error!(SOURCE, "Out of GPU memory for buffer (required: {:.2} MB)", size_mb);
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(Error::OutOfMemory);
                }
            };

            // From here on Drop frees the allocation and destroys the buffer
            let vulkan_buffer = Self {
                ctx: Arc::clone(ctx),
                buffer,
                allocation: Some(allocation),
                size,
                location,
            };

            if let Some(allocation) = &vulkan_buffer.allocation {
                ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                    .map_err(|e| gfx_err!(SOURCE, "Failed to bind buffer memory: {:?}", e))?;
            }

            Ok(vulkan_buffer)
        }
    }

    /// Host pointer to the buffer memory, `None` for device-local memory
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        self.allocation
            .as_ref()?
            .mapped_ptr()
            .map(|ptr| ptr.as_ptr() as *mut u8)
    }

    /// Whether the host can read and write the memory directly
    pub fn is_host_visible(&self) -> bool {
        self.mapped_ptr().is_some()
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
