/// SoftwareBackend - host-memory implementation of GraphicsBackend
///
/// Keeps every buffer object in a plain `Vec<u8>`. Used for headless runs and
/// tests; its capability set is configurable so restricted profiles (no
/// buffer copies, no mapping) can be exercised without special hardware.

use std::sync::Arc;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::backend::{BufferHandle, Capabilities, GraphicsBackend, MapAccess, Usage};
use crate::{gfx_bail, gfx_debug, gfx_error};

const SOURCE: &str = "galaxy3d::software";

/// Software backend configuration
#[derive(Debug, Clone)]
pub struct SoftwareBackendConfig {
    /// Capabilities the backend declares
    pub capabilities: Capabilities,
    /// Maximum number of live buffer objects (`None` = unlimited)
    pub max_buffers: Option<usize>,
}

impl Default for SoftwareBackendConfig {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::full(),
            max_buffers: None,
        }
    }
}

/// Counters describing what a software backend has been asked to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftwareBackendStats {
    /// Buffer objects currently alive
    pub live_buffers: usize,
    /// Bytes currently allocated across all buffers
    pub allocated_bytes: u64,
    /// Number of `allocate_buffer` calls
    pub allocations: u32,
    /// Number of `write_buffer` calls
    pub writes: u32,
    /// Number of `copy_buffer` calls
    pub copies: u32,
    /// Number of successful `map_buffer` calls
    pub maps: u32,
}

/// Storage of one buffer object
#[derive(Debug)]
struct SoftwareBuffer {
    data: Vec<u8>,
    usage: Usage,
    mapping: Option<MapAccess>,
}

/// Host-memory graphics backend
#[derive(Debug)]
pub struct SoftwareBackend {
    config: SoftwareBackendConfig,
    buffers: FxHashMap<BufferHandle, SoftwareBuffer>,
    next_id: u64,
    bound_index_buffer: Option<BufferHandle>,
    stats: Arc<Mutex<SoftwareBackendStats>>,
}

impl SoftwareBackend {
    /// Create a software backend with full capabilities
    pub fn new() -> Self {
        Self::with_config(SoftwareBackendConfig::default())
    }

    /// Create a software backend with an explicit configuration
    pub fn with_config(config: SoftwareBackendConfig) -> Self {
        gfx_debug!(SOURCE, "Software backend created ({:?})", config.capabilities);
        Self {
            config,
            buffers: FxHashMap::default(),
            next_id: 1,
            bound_index_buffer: None,
            stats: Arc::new(Mutex::new(SoftwareBackendStats::default())),
        }
    }

    /// Shared handle on the backend counters
    ///
    /// Stays readable after the backend has been moved into a context.
    pub fn stats_handle(&self) -> Arc<Mutex<SoftwareBackendStats>> {
        Arc::clone(&self.stats)
    }

    /// Snapshot of the backend counters
    pub fn stats(&self) -> SoftwareBackendStats {
        *self.stats.lock()
    }

    /// Buffer currently bound as index source
    pub fn bound_index_buffer(&self) -> Option<BufferHandle> {
        self.bound_index_buffer
    }

    /// Usage hint the buffer storage was last allocated with
    pub fn buffer_usage(&self, handle: BufferHandle) -> Option<Usage> {
        self.buffers.get(&handle).map(|buffer| buffer.usage)
    }

    fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut SoftwareBuffer> {
        match self.buffers.get_mut(&handle) {
            Some(buffer) => Ok(buffer),
            None => gfx_bail!(SOURCE, "Unknown buffer {}", handle),
        }
    }

    fn refresh_totals(&self) {
        let mut stats = self.stats.lock();
        stats.live_buffers = self.buffers.len();
        stats.allocated_bytes = self.buffers.values().map(|b| b.data.len() as u64).sum();
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for SoftwareBackend {
    fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    fn generate_buffer(&mut self) -> Option<BufferHandle> {
        if let Some(max) = self.config.max_buffers {
            if self.buffers.len() >= max {
                return None;
            }
        }

        let handle = BufferHandle::new(self.next_id)?;
        self.next_id += 1;
        self.buffers.insert(handle, SoftwareBuffer {
            data: Vec::new(),
            usage: Usage::default(),
            mapping: None,
        });
        self.refresh_totals();
        Some(handle)
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        if self.buffers.remove(&handle).is_some() {
            if self.bound_index_buffer == Some(handle) {
                self.bound_index_buffer = None;
            }
            self.refresh_totals();
        }
    }

    fn allocate_buffer(&mut self, handle: BufferHandle, size: u64, usage: Usage) -> Result<()> {
        let buffer = self.buffer_mut(handle)?;
        if buffer.mapping.is_some() {
            gfx_bail!(SOURCE, "Cannot reallocate buffer {} while it is mapped", handle);
        }

        let len = usize::try_from(size).map_err(|_| Error::OutOfMemory)?;
        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            gfx_error!(SOURCE, "Could not allocate {} bytes for buffer {}", size, handle);
            return Err(Error::OutOfMemory);
        }
        data.resize(len, 0);
        buffer.data = data;
        buffer.usage = usage;

        self.stats.lock().allocations += 1;
        self.refresh_totals();
        Ok(())
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let buffer = self.buffer_mut(handle)?;
        if buffer.mapping.is_some() {
            gfx_bail!(SOURCE, "Cannot write buffer {} while it is mapped", handle);
        }

        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.data.len() {
            gfx_bail!(SOURCE,
                "Write of {} bytes at offset {} overflows buffer {} ({} bytes)",
                data.len(), offset, handle, buffer.data.len());
        }
        buffer.data[start..end].copy_from_slice(data);

        self.stats.lock().writes += 1;
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) -> Result<()> {
        if !self.config.capabilities.contains(Capabilities::COPY_BUFFER) {
            gfx_bail!(SOURCE, "copy_buffer called on a backend without COPY_BUFFER");
        }

        let (src_start, dst_start, len) = (src_offset as usize, dst_offset as usize, size as usize);

        let source = self.buffer_mut(src)?;
        if source.mapping.is_some() || src_start + len > source.data.len() {
            gfx_bail!(SOURCE, "Invalid copy source range on buffer {}", src);
        }
        let bytes = source.data[src_start..src_start + len].to_vec();

        let destination = self.buffer_mut(dst)?;
        if destination.mapping.is_some() || dst_start + len > destination.data.len() {
            gfx_bail!(SOURCE, "Invalid copy destination range on buffer {}", dst);
        }
        destination.data[dst_start..dst_start + len].copy_from_slice(&bytes);

        self.stats.lock().copies += 1;
        Ok(())
    }

    fn map_buffer(&mut self, handle: BufferHandle, access: MapAccess) -> Option<*mut u8> {
        if !self.config.capabilities.contains(Capabilities::MAP_BUFFER) {
            return None;
        }

        let buffer = self.buffers.get_mut(&handle)?;
        if buffer.mapping.is_some() {
            return None;
        }
        buffer.mapping = Some(access);
        let ptr = buffer.data.as_mut_ptr();

        self.stats.lock().maps += 1;
        Some(ptr)
    }

    fn unmap_buffer(&mut self, handle: BufferHandle) -> bool {
        match self.buffers.get_mut(&handle) {
            Some(buffer) => buffer.mapping.take().is_some(),
            None => false,
        }
    }

    fn bind_index_buffer(&mut self, handle: Option<BufferHandle>) {
        self.bound_index_buffer = handle.filter(|h| self.buffers.contains_key(h));
    }
}

#[cfg(test)]
#[path = "software_backend_tests.rs"]
mod tests;
