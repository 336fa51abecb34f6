//! Integration tests for VulkanBackend
//!
//! These tests drive IndexBuffer on a real Vulkan device.
//! All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_backend_tests -- --ignored

use galaxy_3d_index_buffer::galaxy3d::{GraphicsContext, IndexBuffer, Usage};
use galaxy_3d_index_buffer::galaxy3d::backend::{GraphicsBackend, MapAccess};
use galaxy_3d_index_buffer_vulkan::galaxy3d::{Config, VulkanBackend};
use gpu_allocator::MemoryLocation;
use serial_test::serial;
use std::sync::Arc;

fn test_config() -> Config {
    Config {
        app_name: "Vulkan IndexBuffer Test".to_string(),
        enable_validation: false,
        ..Default::default()
    }
}

fn vulkan_context() -> Arc<GraphicsContext> {
    GraphicsContext::new(VulkanBackend::new(test_config()).unwrap())
}

fn indices(count: u32) -> Vec<u32> {
    (0..count).map(|i| (i * 31) % 997).collect()
}

// ============================================================================
// BACKEND
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_usage_selects_memory_location() {
    let mut backend = VulkanBackend::new(test_config()).unwrap();

    let stream = backend.generate_buffer().unwrap();
    backend.allocate_buffer(stream, 64, Usage::Stream).unwrap();
    let fixed = backend.generate_buffer().unwrap();
    backend.allocate_buffer(fixed, 64, Usage::Static).unwrap();

    assert_eq!(backend.buffer_location(stream), Some(MemoryLocation::CpuToGpu));
    assert_eq!(backend.buffer_location(fixed), Some(MemoryLocation::GpuOnly));
    assert_eq!(backend.buffer_usage(fixed), Some(Usage::Static));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_device_local_map_round_trip() {
    let mut backend = VulkanBackend::new(test_config()).unwrap();
    let handle = backend.generate_buffer().unwrap();
    backend.allocate_buffer(handle, 8, Usage::Static).unwrap();

    let ptr = backend.map_buffer(handle, MapAccess::WriteOnly).unwrap();
    unsafe { std::ptr::copy_nonoverlapping([1u8, 2, 3, 4, 5, 6, 7, 8].as_ptr(), ptr, 8) };
    assert!(backend.unmap_buffer(handle));

    let ptr = backend.map_buffer(handle, MapAccess::ReadOnly).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(ptr, 8) }.to_vec();
    assert!(backend.unmap_buffer(handle));

    assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_bound_buffer_binding_arguments() {
    let mut backend = VulkanBackend::new(test_config()).unwrap();
    let handle = backend.generate_buffer().unwrap();
    backend.allocate_buffer(handle, 12, Usage::Dynamic).unwrap();

    backend.bind_index_buffer(Some(handle));
    let (_, offset, index_type) = backend.index_buffer_binding().unwrap();
    assert_eq!(offset, 0);
    assert_eq!(index_type, ash::vk::IndexType::UINT32);

    backend.delete_buffer(handle);
    assert!(backend.index_buffer_binding().is_none());
}

// ============================================================================
// INDEX BUFFER
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_update_and_read_back_every_usage() {
    let context = vulkan_context();
    let data = indices(1024);

    for usage in [Usage::Stream, Usage::Dynamic, Usage::Static] {
        let mut buffer = IndexBuffer::with_usage(&context, usage);
        buffer.create(data.len()).unwrap();
        buffer.update(&data).unwrap();
        assert_eq!(buffer.read_back().unwrap(), data, "usage {}", usage);
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_update_range_and_grow() {
    let context = vulkan_context();
    let mut buffer = IndexBuffer::with_usage(&context, Usage::Static);
    buffer.create(4).unwrap();

    buffer.update_range(&[7, 8], 2).unwrap();
    assert_eq!(buffer.read_back().unwrap(), vec![0, 0, 7, 8]);

    buffer.update_range(&[1, 2, 3, 4, 5, 6], 0).unwrap();
    assert_eq!(buffer.index_count(), 6);
    assert_eq!(buffer.read_back().unwrap(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_copy_round_trip_through_third_buffer() {
    let context = vulkan_context();
    let data = indices(300);

    let mut first = IndexBuffer::with_usage(&context, Usage::Stream);
    first.create(data.len()).unwrap();
    first.update(&data).unwrap();

    let mut second = IndexBuffer::with_usage(&context, Usage::Static);
    second.create(1).unwrap();
    second.copy_from(&first).unwrap();

    let third = second.clone();
    assert_eq!(third.index_count(), data.len());
    assert_eq!(third.read_back().unwrap(), data);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_bind_and_release() {
    let context = vulkan_context();
    let mut buffer = IndexBuffer::new(&context);
    buffer.create(3).unwrap();
    buffer.update(&[0, 1, 2]).unwrap();

    IndexBuffer::bind(&context, Some(&buffer));
    assert_eq!(context.bound_index_buffer(), buffer.native_handle());

    drop(buffer);
    assert_eq!(context.bound_index_buffer(), None);
}
