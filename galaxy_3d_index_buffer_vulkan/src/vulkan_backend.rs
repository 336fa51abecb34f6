/// VulkanBackend - Vulkan implementation of GraphicsBackend
///
/// Memory policy per usage hint:
/// - `Stream` / `Dynamic`: host-visible memory (`CpuToGpu`), written in place
/// - `Static`: device-local memory (`GpuOnly`), written through staging buffers
///
/// Mapping device-local storage goes through a staging buffer: its contents
/// are downloaded on map and uploaded back when a write-only mapping is
/// released. Every transfer is a one-shot submission followed by a queue wait.

use ash::vk;
use galaxy_3d_index_buffer::galaxy3d::{Result, Usage};
use galaxy_3d_index_buffer::galaxy3d::backend::{BufferHandle, Capabilities, GraphicsBackend, MapAccess};
use galaxy_3d_index_buffer::{gfx_bail, gfx_debug, gfx_error, gfx_info};
use gpu_allocator::MemoryLocation;
use rustc_hash::FxHashMap;
use std::ptr;
use std::sync::Arc;

use crate::config::Config;
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;

const SOURCE: &str = "galaxy3d::vulkan";

/// Memory location used for a usage hint
pub fn memory_location(usage: Usage) -> MemoryLocation {
    if usage.is_frequently_updated() {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    }
}

/// An active mapping of one buffer object
struct Mapping {
    access: MapAccess,
    /// Host-visible copy when the storage itself is device-local
    staging: Option<VulkanBuffer>,
}

/// One buffer object: a handle whose storage may not be allocated yet
struct BufferSlot {
    storage: Option<VulkanBuffer>,
    usage: Usage,
    mapping: Option<Mapping>,
}

/// Vulkan graphics backend
pub struct VulkanBackend {
    ctx: Arc<GpuContext>,
    buffers: FxHashMap<BufferHandle, BufferSlot>,
    next_id: u64,
    bound_index_buffer: Option<BufferHandle>,
}

impl VulkanBackend {
    /// Create a headless Vulkan backend
    pub fn new(config: Config) -> Result<Self> {
        let ctx = Arc::new(GpuContext::new(&config)?);
        gfx_info!(SOURCE, "Vulkan backend created (queue family {})", ctx.graphics_queue_family);

        Ok(Self {
            ctx,
            buffers: FxHashMap::default(),
            next_id: 1,
            bound_index_buffer: None,
        })
    }

    /// Shared GPU context
    pub fn gpu_context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Buffer currently bound as index source
    pub fn bound_index_buffer(&self) -> Option<BufferHandle> {
        self.bound_index_buffer
    }

    /// Arguments for `vkCmdBindIndexBuffer` of the bound index buffer
    ///
    /// `None` if nothing is bound or the bound buffer has no storage.
    pub fn index_buffer_binding(&self) -> Option<(vk::Buffer, vk::DeviceSize, vk::IndexType)> {
        let slot = self.buffers.get(&self.bound_index_buffer?)?;
        let storage = slot.storage.as_ref()?;
        Some((storage.buffer, 0, vk::IndexType::UINT32))
    }

    /// Usage hint the buffer storage was last allocated with
    pub fn buffer_usage(&self, handle: BufferHandle) -> Option<Usage> {
        self.buffers.get(&handle).map(|slot| slot.usage)
    }

    /// Memory location of a buffer's storage
    pub fn buffer_location(&self, handle: BufferHandle) -> Option<MemoryLocation> {
        self.buffers.get(&handle)?.storage.as_ref().map(|storage| storage.location)
    }

    fn slot(&self, handle: BufferHandle) -> Result<&BufferSlot> {
        match self.buffers.get(&handle) {
            Some(slot) => Ok(slot),
            None => gfx_bail!(SOURCE, "Unknown buffer {}", handle),
        }
    }

    /// Storage of an unmapped buffer, checking that `[offset, offset + len)` fits
    fn storage_range(&self, handle: BufferHandle, offset: u64, len: u64) -> Result<&VulkanBuffer> {
        let slot = self.slot(handle)?;
        if slot.mapping.is_some() {
            gfx_bail!(SOURCE, "Buffer {} is mapped", handle);
        }
        let storage = match &slot.storage {
            Some(storage) => storage,
            None => gfx_bail!(SOURCE, "Buffer {} has no storage", handle),
        };
        if offset.checked_add(len).map_or(true, |end| end > storage.size) {
            gfx_bail!(SOURCE,
                "Range {}..{} is out of bounds for buffer {} ({} bytes)",
                offset, offset.saturating_add(len), handle, storage.size);
        }
        Ok(storage)
    }

    fn create_staging(&self, size: u64) -> Result<VulkanBuffer> {
        VulkanBuffer::new(
            &self.ctx,
            "staging buffer",
            size,
            vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::CpuToGpu,
        )
    }

    fn copy_on_device(&self, src: vk::Buffer, dst: vk::Buffer, region: vk::BufferCopy) -> Result<()> {
        self.ctx.submit_one_shot(|device, command_buffer| unsafe {
            device.cmd_copy_buffer(command_buffer, src, dst, &[region]);
        })
    }

    /// Zero the storage so a fresh allocation never exposes stale memory
    fn clear(&self, storage: &VulkanBuffer) -> Result<()> {
        match storage.mapped_ptr() {
            Some(ptr) => {
                // SAFETY: host-visible allocation of `size` bytes, not in use by the device
                unsafe { ptr::write_bytes(ptr, 0, storage.size as usize) };
                Ok(())
            }
            None => {
                let buffer = storage.buffer;
                self.ctx.submit_one_shot(|device, command_buffer| unsafe {
                    device.cmd_fill_buffer(command_buffer, buffer, 0, vk::WHOLE_SIZE, 0);
                })
            }
        }
    }
}

impl GraphicsBackend for VulkanBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    fn generate_buffer(&mut self) -> Option<BufferHandle> {
        let handle = BufferHandle::new(self.next_id)?;
        self.next_id += 1;
        self.buffers.insert(handle, BufferSlot {
            storage: None,
            usage: Usage::default(),
            mapping: None,
        });
        Some(handle)
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        if self.buffers.remove(&handle).is_some() && self.bound_index_buffer == Some(handle) {
            self.bound_index_buffer = None;
        }
    }

    fn allocate_buffer(&mut self, handle: BufferHandle, size: u64, usage: Usage) -> Result<()> {
        let slot = self.slot(handle)?;
        if slot.mapping.is_some() {
            gfx_bail!(SOURCE, "Cannot reallocate buffer {} while it is mapped", handle);
        }

        let storage = if size == 0 {
            None
        } else {
            let storage = VulkanBuffer::new(
                &self.ctx,
                "index buffer",
                size,
                vk::BufferUsageFlags::INDEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_SRC
                    | vk::BufferUsageFlags::TRANSFER_DST,
                memory_location(usage),
            )?;
            self.clear(&storage)?;
            Some(storage)
        };

        gfx_debug!(SOURCE, "Buffer {} allocated: {} bytes ({})", handle, size, usage);

        if let Some(slot) = self.buffers.get_mut(&handle) {
            // Previous storage is released here
            slot.storage = storage;
            slot.usage = usage;
        }
        Ok(())
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let storage = self.storage_range(handle, offset, data.len() as u64)?;

        if let Some(mapped) = storage.mapped_ptr() {
            // SAFETY: range checked above; the device is idle after every submission
            unsafe {
                ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
            }
            return Ok(());
        }

        let staging = self.create_staging(data.len() as u64)?;
        let staging_ptr = match staging.mapped_ptr() {
            Some(ptr) => ptr,
            None => gfx_bail!(SOURCE, "Staging buffer is not host-visible"),
        };
        // SAFETY: staging holds exactly data.len() bytes
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), staging_ptr, data.len());
        }

        let region = vk::BufferCopy::default()
            .src_offset(0)
            .dst_offset(offset)
            .size(data.len() as u64);
        self.copy_on_device(staging.buffer, storage.buffer, region)
    }

    fn copy_buffer(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let source = self.storage_range(src, src_offset, size)?.buffer;
        let destination = self.storage_range(dst, dst_offset, size)?.buffer;

        let region = vk::BufferCopy::default()
            .src_offset(src_offset)
            .dst_offset(dst_offset)
            .size(size);
        self.copy_on_device(source, destination, region)
    }

    fn map_buffer(&mut self, handle: BufferHandle, access: MapAccess) -> Option<*mut u8> {
        let slot = self.buffers.get(&handle)?;
        if slot.mapping.is_some() {
            return None;
        }
        let storage = slot.storage.as_ref()?;

        if let Some(ptr) = storage.mapped_ptr() {
            if let Some(slot) = self.buffers.get_mut(&handle) {
                slot.mapping = Some(Mapping { access, staging: None });
            }
            return Some(ptr);
        }

        // Device-local storage: download into a staging buffer
        let staging = match self.create_staging(storage.size) {
            Ok(staging) => staging,
            Err(err) => {
                gfx_error!(SOURCE, "Could not map buffer {}: {}", handle, err);
                return None;
            }
        };
        let region = vk::BufferCopy::default().size(storage.size);
        if let Err(err) = self.copy_on_device(storage.buffer, staging.buffer, region) {
            gfx_error!(SOURCE, "Could not map buffer {}: {}", handle, err);
            return None;
        }

        let ptr = staging.mapped_ptr()?;
        let slot = self.buffers.get_mut(&handle)?;
        slot.mapping = Some(Mapping { access, staging: Some(staging) });
        Some(ptr)
    }

    fn unmap_buffer(&mut self, handle: BufferHandle) -> bool {
        let mapping = match self.buffers.get_mut(&handle).and_then(|slot| slot.mapping.take()) {
            Some(mapping) => mapping,
            None => return false,
        };

        let staging = match mapping.staging {
            Some(staging) if mapping.access == MapAccess::WriteOnly => staging,
            _ => return true,
        };

        let destination = match self.buffers.get(&handle).and_then(|slot| slot.storage.as_ref()) {
            Some(storage) => storage.buffer,
            None => return false,
        };

        let region = vk::BufferCopy::default().size(staging.size);
        match self.copy_on_device(staging.buffer, destination, region) {
            Ok(()) => true,
            Err(err) => {
                gfx_error!(SOURCE, "Uploading mapped contents of buffer {} failed: {}", handle, err);
                false
            }
        }
    }

    fn bind_index_buffer(&mut self, handle: Option<BufferHandle>) {
        self.bound_index_buffer = handle.filter(|h| self.buffers.contains_key(h));
    }
}

#[cfg(test)]
#[path = "vulkan_backend_tests.rs"]
mod tests;
