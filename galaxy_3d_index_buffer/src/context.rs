/// Graphics context and scoped context guard
///
/// A `GraphicsContext` owns one backend plus the state that belongs to the
/// context rather than to any buffer (the currently bound index buffer).
/// Every backend call is made through a [`ContextGuard`], an RAII value that
/// keeps the context current for the calling thread and is released on every
/// exit path, including `?` early returns and unwinding.
///
/// The guard is reentrant: a thread that already holds it may acquire it
/// again (for instance when an `IndexBuffer` is dropped inside a guarded
/// section). Other threads block until it is released.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use crate::backend::{BufferHandle, Capabilities, GraphicsBackend};
use crate::error::{Error, Result};
use crate::{gfx_debug, gfx_info};

const SOURCE: &str = "galaxy3d::Context";

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

// ===== CONTEXT STATE =====

/// State reachable while the context guard is held
pub struct ContextState {
    backend: Box<dyn GraphicsBackend>,
    /// Raw id of the bound index buffer, 0 for none. Shared with the owning
    /// context so it stays readable while this state is borrowed.
    bound_index_buffer: Arc<AtomicU64>,
}

impl ContextState {
    /// Backend of this context
    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        self.backend.as_mut()
    }

    /// Buffer currently bound as index source in this context
    pub fn bound_index_buffer(&self) -> Option<BufferHandle> {
        load_binding(&self.bound_index_buffer)
    }

    /// Bind a buffer (or none) as the index source of this context
    pub fn bind_index_buffer(&mut self, handle: Option<BufferHandle>) {
        self.backend.bind_index_buffer(handle);
        self.bound_index_buffer.store(handle.map_or(0, BufferHandle::get), Ordering::Release);
    }

    /// Delete a buffer object, unbinding it first if it is the bound index source
    pub fn delete_buffer(&mut self, handle: BufferHandle) {
        if self.bound_index_buffer() == Some(handle) {
            self.bind_index_buffer(None);
        }
        self.backend.delete_buffer(handle);
    }
}

// ===== CONTEXT GUARD =====

/// Scoped acquisition of a graphics context
///
/// Dropping the guard releases the context.
pub struct ContextGuard<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<ContextState>>,
}

impl<'a> ContextGuard<'a> {
    /// Borrow the context state
    ///
    /// # Panics
    ///
    /// Panics if the same thread already borrows the state through an outer
    /// guard. Use [`try_state`](Self::try_state) on paths that must not panic.
    pub fn state(&self) -> RefMut<'_, ContextState> {
        self.guard.borrow_mut()
    }

    /// Borrow the context state, `None` if an outer guard on this thread already borrows it
    pub fn try_state(&self) -> Option<RefMut<'_, ContextState>> {
        self.guard.try_borrow_mut().ok()
    }

    /// Borrow the context state for a fallible operation
    ///
    /// # Errors
    ///
    /// `BackendError` if an outer guard on this thread already borrows the state.
    pub fn state_for_operation(&self) -> Result<RefMut<'_, ContextState>> {
        self.try_state().ok_or_else(|| {
            Error::BackendError("context state already borrowed on this thread".to_string())
        })
    }
}

fn load_binding(bound: &AtomicU64) -> Option<BufferHandle> {
    BufferHandle::new(bound.load(Ordering::Acquire))
}

// ===== GRAPHICS CONTEXT =====

/// A graphics context shared by every buffer created in it
///
/// Contexts are independent: binding a buffer in one context never affects
/// another context of the same process.
pub struct GraphicsContext {
    id: u64,
    capabilities: Capabilities,
    state: ReentrantMutex<RefCell<ContextState>>,
    bound_index_buffer: Arc<AtomicU64>,
    /// Buffers whose release had to be postponed because the state was
    /// already borrowed by an outer guard on the releasing thread
    pending_deletes: Mutex<Vec<BufferHandle>>,
}

impl GraphicsContext {
    /// Create a context around a backend
    ///
    /// # Example
    ///
    /// ```
    /// use galaxy_3d_index_buffer::galaxy3d::{GraphicsContext, backend::SoftwareBackend};
    ///
    /// let context = GraphicsContext::new(SoftwareBackend::new());
    /// assert!(context.bound_index_buffer().is_none());
    /// ```
    pub fn new<B: GraphicsBackend + 'static>(backend: B) -> Arc<Self> {
        Self::from_boxed(Box::new(backend))
    }

    /// Create a context around an already boxed backend
    pub fn from_boxed(backend: Box<dyn GraphicsBackend>) -> Arc<Self> {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let capabilities = backend.capabilities();
        gfx_info!(SOURCE, "Graphics context {} created ({:?})", id, capabilities);
        let bound_index_buffer = Arc::new(AtomicU64::new(0));

        Arc::new(Self {
            id,
            capabilities,
            state: ReentrantMutex::new(RefCell::new(ContextState {
                backend,
                bound_index_buffer: Arc::clone(&bound_index_buffer),
            })),
            bound_index_buffer,
            pending_deletes: Mutex::new(Vec::new()),
        })
    }

    /// Process-unique id of this context
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Capabilities declared by the backend
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Acquire the context for the calling thread
    pub fn lock(&self) -> ContextGuard<'_> {
        let guard = ContextGuard { guard: self.state.lock() };
        self.flush_pending_deletes(&guard);
        guard
    }

    /// Buffer currently bound as index source
    ///
    /// Readable at any time, including while the calling thread borrows the state.
    pub fn bound_index_buffer(&self) -> Option<BufferHandle> {
        let _guard = self.state.lock();
        load_binding(&self.bound_index_buffer)
    }

    /// Release a buffer object from a path that must never panic (Drop)
    pub(crate) fn release_buffer(&self, handle: BufferHandle) {
        let guard = self.lock();
        match guard.try_state() {
            Some(mut state) => state.delete_buffer(handle),
            None => {
                gfx_debug!(SOURCE, "Context {} busy on this thread, deferring release of buffer {}", self.id, handle);
                self.pending_deletes.lock().push(handle);
            }
        }
    }

    fn flush_pending_deletes(&self, guard: &ContextGuard<'_>) {
        let mut pending = self.pending_deletes.lock();
        if pending.is_empty() {
            return;
        }

        // Outer guard on this thread still borrows the state; retry on the next lock
        if let Some(mut state) = guard.try_state() {
            gfx_debug!(SOURCE, "Context {} releasing {} deferred buffers", self.id, pending.len());
            for handle in pending.drain(..) {
                state.delete_buffer(handle);
            }
        }
    }
}

impl fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
