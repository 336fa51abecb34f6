/// Buffer handle, usage hint and mapping access types

use std::fmt;
use std::num::NonZeroU64;

/// Size in bytes of one index (indices are always `u32`)
pub const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Opaque backend identifier of a buffer object
///
/// Handles are never zero; "no buffer" is expressed as `Option<BufferHandle>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(NonZeroU64);

impl BufferHandle {
    /// Wrap a raw backend id, `None` if the id is zero
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw backend id
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocation hint for buffer storage
///
/// The hint only selects the backend's allocation strategy. It never changes
/// what operations are allowed or what they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Usage {
    /// Contents are rewritten (almost) every frame
    #[default]
    Stream,
    /// Contents change from time to time
    Dynamic,
    /// Contents are written once and drawn many times
    Static,
}

impl Usage {
    /// Whether the backend should favor host-visible, frequently-updated memory
    pub fn is_frequently_updated(self) -> bool {
        matches!(self, Usage::Stream | Usage::Dynamic)
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Usage::Stream => write!(f, "stream"),
            Usage::Dynamic => write!(f, "dynamic"),
            Usage::Static => write!(f, "static"),
        }
    }
}

/// Host access requested when mapping buffer storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAccess {
    /// Host reads the current contents
    ReadOnly,
    /// Host overwrites the contents; previous contents need not be visible
    WriteOnly,
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
