//! Unit tests for context.rs
//!
//! Tests guard acquisition, reentrancy, per-context bound state and deferred releases.

use crate::backend::{Capabilities, GraphicsBackend, SoftwareBackend, SoftwareBackendConfig, Usage};
use crate::context::GraphicsContext;
use crate::error::Error;
use std::sync::Arc;
use std::thread;

// ============================================================================
// CREATION
// ============================================================================

#[test]
fn test_context_ids_are_unique() {
    let a = GraphicsContext::new(SoftwareBackend::new());
    let b = GraphicsContext::new(SoftwareBackend::new());
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_context_caches_backend_capabilities() {
    let context = GraphicsContext::new(SoftwareBackend::with_config(SoftwareBackendConfig {
        capabilities: Capabilities::embedded(),
        max_buffers: None,
    }));
    assert_eq!(context.capabilities(), Capabilities::INDEX_BUFFER);
}

#[test]
fn test_context_from_boxed_backend() {
    let backend: Box<dyn GraphicsBackend> = Box::new(SoftwareBackend::new());
    let context = GraphicsContext::from_boxed(backend);
    assert_eq!(context.capabilities(), Capabilities::full());
}

#[test]
fn test_context_debug_output() {
    let context = GraphicsContext::new(SoftwareBackend::new());
    let debug = format!("{:?}", context);
    assert!(debug.contains("GraphicsContext"));
    assert!(debug.contains("id"));
}

// ============================================================================
// GUARD
// ============================================================================

#[test]
fn test_guard_is_reentrant_on_same_thread() {
    let context = GraphicsContext::new(SoftwareBackend::new());

    let outer = context.lock();
    let inner = context.lock();

    // Only one of the two may borrow the state at a time
    let state = outer.state();
    assert!(inner.try_state().is_none());
    drop(state);
    assert!(inner.try_state().is_some());
}

#[test]
fn test_guard_state_reaches_backend() {
    let context = GraphicsContext::new(SoftwareBackend::new());
    let guard = context.lock();
    let mut state = guard.state();

    let handle = state.backend().generate_buffer().unwrap();
    state.backend().allocate_buffer(handle, 16, Usage::Static).unwrap();
    state.delete_buffer(handle);
}

#[test]
fn test_guard_serializes_threads() {
    let backend = SoftwareBackend::new();
    let stats = backend.stats_handle();
    let context = GraphicsContext::new(backend);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                for _ in 0..25 {
                    let guard = context.lock();
                    let mut state = guard.state();
                    let handle = state.backend().generate_buffer().unwrap();
                    state.backend().allocate_buffer(handle, 4, Usage::Stream).unwrap();
                    state.delete_buffer(handle);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let snapshot = *stats.lock();
    assert_eq!(snapshot.allocations, 100);
    assert_eq!(snapshot.live_buffers, 0);
}

// ============================================================================
// BOUND STATE
// ============================================================================

#[test]
fn test_bound_state_is_per_context() {
    let a = GraphicsContext::new(SoftwareBackend::new());
    let b = GraphicsContext::new(SoftwareBackend::new());

    let handle = {
        let guard = a.lock();
        let mut state = guard.state();
        let handle = state.backend().generate_buffer().unwrap();
        state.bind_index_buffer(Some(handle));
        handle
    };

    assert_eq!(a.bound_index_buffer(), Some(handle));
    assert_eq!(b.bound_index_buffer(), None);
}

#[test]
fn test_bound_index_buffer_readable_while_state_borrowed() {
    let context = GraphicsContext::new(SoftwareBackend::new());
    let guard = context.lock();
    let mut state = guard.state();

    let handle = state.backend().generate_buffer().unwrap();
    state.bind_index_buffer(Some(handle));

    assert_eq!(context.bound_index_buffer(), Some(handle));
    assert_eq!(state.bound_index_buffer(), Some(handle));
}

#[test]
fn test_state_for_operation_fails_while_borrowed() {
    let context = GraphicsContext::new(SoftwareBackend::new());
    let outer = context.lock();
    let inner = context.lock();

    {
        let _state = outer.state();
        assert!(matches!(inner.state_for_operation(), Err(Error::BackendError(_))));
    }
    assert!(inner.state_for_operation().is_ok());
}

#[test]
fn test_deleting_bound_buffer_unbinds_it() {
    let context = GraphicsContext::new(SoftwareBackend::new());
    let guard = context.lock();
    let mut state = guard.state();

    let handle = state.backend().generate_buffer().unwrap();
    state.bind_index_buffer(Some(handle));
    state.delete_buffer(handle);

    assert_eq!(state.bound_index_buffer(), None);
}

// ============================================================================
// DEFERRED RELEASE
// ============================================================================

#[test]
fn test_release_while_state_borrowed_is_deferred() {
    let backend = SoftwareBackend::new();
    let stats = backend.stats_handle();
    let context = GraphicsContext::new(backend);

    {
        let guard = context.lock();
        let mut state = guard.state();
        let handle = state.backend().generate_buffer().unwrap();

        // Same thread, state already borrowed: must not panic, must not leak
        context.release_buffer(handle);
        assert_eq!(stats.lock().live_buffers, 1);
    }

    // Next acquisition flushes the deferred release
    drop(context.lock());
    assert_eq!(stats.lock().live_buffers, 0);
}
