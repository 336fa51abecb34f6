/// IndexBuffer - GPU storage for 32-bit vertex indices
///
/// Lifecycle:
/// - `new()` / `with_usage()` hold no GPU storage
/// - `create(n)` (re)allocates storage for `n` indices, discarding contents;
///   `create(0)` releases the storage and keeps the object reusable
/// - `update()` / `update_range()` push host data, growing the allocation
///   when an offset-0 write is at least as large as the current capacity
/// - `copy_from()` duplicates another buffer on the device
/// - `bind()` selects the index source of a context for indexed draws
/// - dropping the buffer releases its storage
///
/// Every backend call is made under the owning context's guard.

use std::mem;
use std::ptr;
use std::sync::Arc;

use crate::backend::{BufferHandle, Capabilities, MapAccess, Usage, INDEX_SIZE};
use crate::context::{ContextState, GraphicsContext};
use crate::error::{Error, Result};
use crate::{gfx_error, gfx_trace, gfx_warn};

const SOURCE: &str = "galaxy3d::IndexBuffer";

/// GPU-resident buffer of `u32` indices
///
/// Invariant: `native_handle()` is `None` exactly when `index_count()` is 0.
///
/// Each instance exclusively owns its backend buffer. `clone()` duplicates the
/// GPU contents into a fresh buffer of the same capacity.
pub struct IndexBuffer {
    context: Arc<GraphicsContext>,
    handle: Option<BufferHandle>,
    capacity: usize,
    usage: Usage,
}

impl IndexBuffer {
    /// Create an empty index buffer with the `Stream` usage hint
    pub fn new(context: &Arc<GraphicsContext>) -> Self {
        Self::with_usage(context, Usage::default())
    }

    /// Create an empty index buffer with an explicit usage hint
    pub fn with_usage(context: &Arc<GraphicsContext>, usage: Usage) -> Self {
        Self {
            context: Arc::clone(context),
            handle: None,
            capacity: 0,
            usage,
        }
    }

    // ===== LIFECYCLE =====

    /// Allocate storage for `index_count` indices, discarding previous contents
    ///
    /// This is the only operation that can shrink the buffer. `create(0)`
    /// releases the backend buffer.
    ///
    /// # Errors
    ///
    /// - `FeatureUnavailable` if the backend does not support index buffers
    /// - `HandleGenerationFailed` if the backend could not create a buffer object
    /// - `InvalidArgument` if `index_count` indices do not fit in a byte size
    /// - `BackendError` if the calling thread already borrows the context state
    /// - backend errors (`OutOfMemory`, `BackendError`) from the allocation;
    ///   the capacity is left unchanged in that case
    pub fn create(&mut self, index_count: usize) -> Result<()> {
        if !Self::is_available(&self.context) {
            gfx_error!(SOURCE, "Could not create index buffer, feature unavailable");
            return Err(Error::FeatureUnavailable);
        }
        let size = byte_size(index_count)?;

        let guard = self.context.lock();
        let mut state = guard.state_for_operation()?;

        if index_count == 0 {
            if let Some(handle) = self.handle.take() {
                state.delete_buffer(handle);
            }
            self.capacity = 0;
            return Ok(());
        }

        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = state.backend().generate_buffer().ok_or_else(|| {
                    gfx_error!(SOURCE, "Could not create index buffer, generation failed");
                    Error::HandleGenerationFailed
                })?;
                self.handle = Some(handle);
                handle
            }
        };

        if let Err(err) = state.backend().allocate_buffer(handle, size, self.usage) {
            // A freshly generated handle must not survive without storage
            if self.capacity == 0 {
                self.handle = None;
                state.delete_buffer(handle);
            }
            return Err(err);
        }

        self.capacity = index_count;
        Ok(())
    }

    // ===== HOST UPLOADS =====

    /// Overwrite the whole current extent with the first `index_count()` indices
    ///
    /// # Errors
    ///
    /// - `BufferNotCreated` if the buffer holds no storage
    /// - `InvalidArgument` if `indices` is shorter than the current capacity
    pub fn update(&mut self, indices: &[u32]) -> Result<()> {
        if self.handle.is_none() {
            return Err(Error::BufferNotCreated);
        }
        if indices.len() < self.capacity {
            return Err(Error::InvalidArgument(format!(
                "expected at least {} indices, got {}",
                self.capacity,
                indices.len()
            )));
        }
        let count = self.capacity;
        self.update_range(&indices[..count], 0)
    }

    /// Write `indices` starting at index `offset`
    ///
    /// The bound check only applies to non-zero offsets: an offset-0 write of
    /// at least `index_count()` indices reallocates the storage to exactly
    /// `indices.len()` (previous contents are discarded) and can therefore grow
    /// the buffer. An empty slice is a no-op.
    ///
    /// # Errors
    ///
    /// - `BufferNotCreated` if the buffer holds no storage
    /// - `CapacityExceeded` if `offset != 0` and the write ends past the capacity
    /// - `BackendError` if the calling thread already borrows the context state
    /// - backend errors from the write. When the write follows a reallocation
    ///   the previous contents are already gone and the new capacity is kept.
    pub fn update_range(&mut self, indices: &[u32], offset: usize) -> Result<()> {
        let handle = self.handle.ok_or(Error::BufferNotCreated)?;
        let count = indices.len();

        if offset != 0 && offset.checked_add(count).map_or(true, |end| end > self.capacity) {
            return Err(Error::CapacityExceeded {
                offset,
                count,
                capacity: self.capacity,
            });
        }

        if count == 0 {
            return Ok(());
        }

        let offset_bytes = byte_size(offset)?;
        let size = byte_size(count)?;

        let guard = self.context.lock();
        let mut state = guard.state_for_operation()?;

        // Grow, or orphan the previous storage when the whole extent is replaced
        if count >= self.capacity {
            state.backend().allocate_buffer(handle, size, self.usage)?;
            self.capacity = count;
        }

        state.backend().write_buffer(handle, offset_bytes, bytemuck::cast_slice(indices))
    }

    // ===== DEVICE COPY =====

    /// Replace the contents of this buffer with a copy of `source`
    ///
    /// The copy stays on the device when the backend supports direct
    /// buffer-to-buffer copies. Otherwise both buffers are mapped and copied
    /// through host memory.
    ///
    /// # Errors
    ///
    /// - `BufferNotCreated` if either buffer holds no storage
    /// - `InvalidArgument` if the buffers belong to different contexts
    /// - `CopyUnsupported` if the backend can neither copy nor map buffers
    /// - `BackendError` if the calling thread already borrows the context state
    /// - `MapFailed` if mapping failed (nothing was copied)
    /// - `UnmapFailed` if unmapping failed. The bytes were already copied
    ///   when this is reported, so the contents may be partially applied and
    ///   the buffer should be recreated. There is no rollback.
    ///
    /// The destination is reallocated to the source capacity before copying
    /// (always on the host path, only when capacities differ on the device
    /// path). If the copy fails after that reallocation, the previous contents
    /// are lost and `index_count()` already reports the source capacity.
    pub fn copy_from(&mut self, source: &IndexBuffer) -> Result<()> {
        let (dst, src) = match (self.handle, source.handle) {
            (Some(dst), Some(src)) => (dst, src),
            _ => return Err(Error::BufferNotCreated),
        };

        if !Arc::ptr_eq(&self.context, &source.context) {
            return Err(Error::InvalidArgument(
                "source buffer belongs to another graphics context".to_string(),
            ));
        }

        let capabilities = self.context.capabilities();
        if !capabilities.supports_buffer_copy() {
            return Err(Error::CopyUnsupported);
        }

        let size = byte_size(source.capacity)?;
        let guard = self.context.lock();
        let mut state = guard.state_for_operation()?;

        if capabilities.contains(Capabilities::COPY_BUFFER) {
            if self.capacity != source.capacity {
                state.backend().allocate_buffer(dst, size, self.usage)?;
                self.capacity = source.capacity;
            }
            return state.backend().copy_buffer(src, dst, 0, 0, size);
        }

        state.backend().allocate_buffer(dst, size, self.usage)?;
        self.capacity = source.capacity;
        copy_through_host(&mut state, src, dst, size)
    }

    // ===== READ BACK =====

    /// Read the whole storage back into host memory
    ///
    /// # Errors
    ///
    /// - `BufferNotCreated` if the buffer holds no storage
    /// - `CopyUnsupported` if the backend cannot map buffers
    /// - `BackendError` if the calling thread already borrows the context state
    /// - `MapFailed` / `UnmapFailed` from the mapping
    pub fn read_back(&self) -> Result<Vec<u32>> {
        let handle = self.handle.ok_or(Error::BufferNotCreated)?;
        if !self.context.capabilities().contains(Capabilities::MAP_BUFFER) {
            return Err(Error::CopyUnsupported);
        }
        let size = byte_size(self.capacity)?;

        let guard = self.context.lock();
        let mut state = guard.state_for_operation()?;

        let ptr = state
            .backend()
            .map_buffer(handle, MapAccess::ReadOnly)
            .ok_or(Error::MapFailed)?;

        let mut indices = vec![0u32; self.capacity];
        // SAFETY: the mapping covers the whole storage, which is `capacity` indices,
        // and stays valid until unmap_buffer below.
        unsafe {
            ptr::copy_nonoverlapping(
                ptr as *const u8,
                bytemuck::cast_slice_mut::<u32, u8>(&mut indices).as_mut_ptr(),
                size as usize,
            );
        }

        if !state.backend().unmap_buffer(handle) {
            gfx_error!(SOURCE, "Unmapping buffer {} after read back failed", handle);
            return Err(Error::UnmapFailed);
        }
        Ok(indices)
    }

    // ===== BINDING =====

    /// Make `buffer` (or none) the index source for indexed draws in `context`
    ///
    /// Silently does nothing when index buffers are unavailable. A buffer that
    /// belongs to another context is ignored, and so is the call when the
    /// calling thread already borrows the context state.
    pub fn bind(context: &GraphicsContext, buffer: Option<&IndexBuffer>) {
        if !Self::is_available(context) {
            gfx_trace!(SOURCE, "bind ignored, index buffers unavailable");
            return;
        }

        if let Some(buffer) = buffer {
            if !ptr::eq(Arc::as_ptr(&buffer.context), context) {
                gfx_warn!(SOURCE, "bind ignored, buffer belongs to context {} not {}",
                    buffer.context.id(), context.id());
                return;
            }
        }

        let guard = context.lock();
        match guard.try_state() {
            Some(mut state) => state.bind_index_buffer(buffer.and_then(|b| b.handle)),
            None => gfx_warn!(SOURCE, "bind ignored, context {} state already borrowed on this thread",
                context.id()),
        }
    }

    /// Whether `context` supports index buffers
    ///
    /// Reports the capability declared by the backend.
    pub fn is_available(context: &GraphicsContext) -> bool {
        context.capabilities().contains(Capabilities::INDEX_BUFFER)
    }

    // ===== ACCESSORS =====

    /// Number of indices currently allocated
    pub fn index_count(&self) -> usize {
        self.capacity
    }

    /// Usage hint used for the next allocation
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Change the usage hint
    ///
    /// Takes effect at the next allocation; existing storage is not touched.
    pub fn set_usage(&mut self, usage: Usage) {
        self.usage = usage;
    }

    /// Backend handle of the storage, `None` if not created
    pub fn native_handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Context owning the storage
    pub fn context(&self) -> &Arc<GraphicsContext> {
        &self.context
    }

    /// Exchange the contents of two buffers without touching the GPU
    pub fn swap(&mut self, other: &mut IndexBuffer) {
        mem::swap(&mut self.handle, &mut other.handle);
        mem::swap(&mut self.capacity, &mut other.capacity);
        mem::swap(&mut self.usage, &mut other.usage);
        mem::swap(&mut self.context, &mut other.context);
    }
}

/// Byte size of `count` indices
fn byte_size(count: usize) -> Result<u64> {
    u64::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(INDEX_SIZE))
        .ok_or_else(|| Error::InvalidArgument(format!("{} indices exceed the addressable size", count)))
}

/// Map both buffers and copy `size` bytes from `src` into `dst` on the host
///
/// If an unmap fails the bytes have already been copied; the failure is
/// still reported so callers can recreate the destination.
fn copy_through_host(
    state: &mut ContextState,
    src: BufferHandle,
    dst: BufferHandle,
    size: u64,
) -> Result<()> {
    let destination = state.backend().map_buffer(dst, MapAccess::WriteOnly);
    let source = state.backend().map_buffer(src, MapAccess::ReadOnly);

    let (destination, source) = match (destination, source) {
        (Some(destination), Some(source)) => (destination, source),
        (destination, source) => {
            if source.is_some() {
                state.backend().unmap_buffer(src);
            }
            if destination.is_some() {
                state.backend().unmap_buffer(dst);
            }
            gfx_error!(SOURCE, "Could not map buffers {} -> {} for copying", src, dst);
            return Err(Error::MapFailed);
        }
    };

    // SAFETY: both mappings cover at least `size` bytes (dst was just
    // reallocated to `size`, src holds `size` bytes) and are distinct buffers.
    unsafe {
        ptr::copy_nonoverlapping(source as *const u8, destination, size as usize);
    }

    let source_result = state.backend().unmap_buffer(src);
    let destination_result = state.backend().unmap_buffer(dst);

    if !source_result || !destination_result {
        gfx_error!(SOURCE,
            "Unmapping failed after copying buffer {} -> {}, destination may be partially copied",
            src, dst);
        return Err(Error::UnmapFailed);
    }
    Ok(())
}

impl Clone for IndexBuffer {
    /// Duplicate the GPU contents into a freshly allocated buffer
    ///
    /// Failures are reported on the logging sink; the returned buffer then
    /// holds whatever state was reached (no storage if creation failed).
    fn clone(&self) -> Self {
        let mut copy = IndexBuffer::with_usage(&self.context, self.usage);

        if self.handle.is_some() && self.capacity > 0 {
            if let Err(err) = copy.create(self.capacity) {
                gfx_error!(SOURCE, "Could not create index buffer for copying: {}", err);
                return copy;
            }

            if let Err(err) = copy.copy_from(self) {
                gfx_error!(SOURCE, "Could not copy index buffer: {}", err);
            }
        }

        copy
    }

    /// Copy-and-swap: the previous storage is released when the temporary drops
    fn clone_from(&mut self, source: &Self) {
        let mut temp = source.clone();
        self.swap(&mut temp);
    }
}

impl Drop for IndexBuffer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.context.release_buffer(handle);
        }
    }
}

impl std::fmt::Debug for IndexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuffer")
            .field("context", &self.context.id())
            .field("handle", &self.handle)
            .field("capacity", &self.capacity)
            .field("usage", &self.usage)
            .finish()
    }
}

#[cfg(test)]
#[path = "index_buffer_tests.rs"]
mod tests;
