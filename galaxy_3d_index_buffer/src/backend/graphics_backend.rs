/// GraphicsBackend trait - the capability service index buffers are built on

use crate::error::Result;
use crate::backend::{BufferHandle, Capabilities, MapAccess, Usage};

/// Graphics backend trait
///
/// This is the only interface index buffers use to reach GPU memory.
/// Implemented by [`SoftwareBackend`](crate::backend::SoftwareBackend) and by
/// backend crates (e.g., `VulkanBackend`).
///
/// Callers always hold the owning context's guard while calling into a
/// backend, so implementations only need to be `Send`, not `Sync`.
///
/// Sizes and offsets are in bytes. Buffers are addressed directly by handle.
pub trait GraphicsBackend: Send {
    /// Features this backend supports
    fn capabilities(&self) -> Capabilities;

    /// Generate a new buffer object with no storage
    ///
    /// # Returns
    ///
    /// `None` if the backend cannot create another buffer object
    fn generate_buffer(&mut self) -> Option<BufferHandle>;

    /// Delete a buffer object and release its storage
    ///
    /// Must not fail; unknown handles are ignored.
    fn delete_buffer(&mut self, handle: BufferHandle);

    /// Allocate (or reallocate) storage for a buffer, discarding previous contents
    ///
    /// # Arguments
    ///
    /// * `handle` - Buffer to allocate storage for
    /// * `size` - New storage size in bytes (may be 0)
    /// * `usage` - Allocation hint
    fn allocate_buffer(&mut self, handle: BufferHandle, size: u64, usage: Usage) -> Result<()>;

    /// Write bytes into buffer storage
    ///
    /// # Arguments
    ///
    /// * `handle` - Destination buffer
    /// * `offset` - Byte offset into the storage
    /// * `data` - Bytes to write
    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Copy a byte range between two buffers without a host round-trip
    ///
    /// Only called when [`Capabilities::COPY_BUFFER`] is declared.
    fn copy_buffer(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) -> Result<()>;

    /// Map buffer storage into host-addressable memory
    ///
    /// Only called when [`Capabilities::MAP_BUFFER`] is declared. The returned
    /// pointer covers the whole storage and stays valid until
    /// [`unmap_buffer`](Self::unmap_buffer) is called for the same handle.
    ///
    /// # Returns
    ///
    /// `None` if the buffer cannot be mapped
    fn map_buffer(&mut self, handle: BufferHandle, access: MapAccess) -> Option<*mut u8>;

    /// Unmap a previously mapped buffer
    ///
    /// # Returns
    ///
    /// `false` if the mapped contents were lost or corrupted while mapped,
    /// or if the buffer was not mapped
    fn unmap_buffer(&mut self, handle: BufferHandle) -> bool;

    /// Make a buffer (or none) the active index source for indexed draws
    fn bind_index_buffer(&mut self, handle: Option<BufferHandle>);
}
