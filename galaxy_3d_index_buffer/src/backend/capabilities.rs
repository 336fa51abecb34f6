/// Backend capability flags

use bitflags::bitflags;

bitflags! {
    /// Features a graphics backend declares support for
    ///
    /// Index buffer code never guesses capabilities: it only trusts what the
    /// backend declares here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Buffer objects usable as an index source
        const INDEX_BUFFER = 1 << 0;
        /// Direct buffer-to-buffer copy on the device
        const COPY_BUFFER  = 1 << 1;
        /// Mapping buffer storage into host-addressable memory
        const MAP_BUFFER   = 1 << 2;
    }
}

impl Capabilities {
    /// Desktop-class backend: everything supported
    pub fn full() -> Self {
        Self::all()
    }

    /// Lightweight embedded profile: index buffers, but no way to copy
    /// between buffer objects (neither direct copy nor mapping)
    pub fn embedded() -> Self {
        Self::INDEX_BUFFER
    }

    /// Whether `IndexBuffer::copy_from` can succeed at all on this backend
    pub fn supports_buffer_copy(self) -> bool {
        self.intersects(Self::COPY_BUFFER | Self::MAP_BUFFER)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
#[path = "capabilities_tests.rs"]
mod tests;
