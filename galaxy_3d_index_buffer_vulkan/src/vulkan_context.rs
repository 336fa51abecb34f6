/// GpuContext - Shared GPU resources for all Vulkan buffers
///
/// Contains everything needed for GPU operations:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Queue for command submission
/// - Command pool for one-shot transfer operations
///
/// Created headless: no surface or swapchain is involved.

use ash::vk;
use galaxy_3d_index_buffer::galaxy3d::{Error, Result};
use galaxy_3d_index_buffer::{gfx_err, gfx_error, gfx_info, gfx_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

use crate::config::Config;

const SOURCE: &str = "galaxy3d::vulkan";

/// Shared GPU context for all Vulkan resources
///
/// Shared (via `Arc`) by the backend and every buffer it allocates, so the
/// device outlives all of them.
pub struct GpuContext {
    _entry: ash::Entry,
    instance: ash::Instance,

    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue for command submission
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Command pool for one-shot transfers (TRANSIENT + RESET_COMMAND_BUFFER)
    upload_command_pool: vk::CommandPool,

    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl GpuContext {
    /// Create instance, device, allocator and upload command pool
    pub fn new(config: &Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    gfx_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let validation = Self::validation_requested(config);

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| Error::InvalidArgument("application name contains a NUL byte".to_string()))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Galaxy3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_1);

            let mut extension_names = Vec::new();
            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    gfx_error!(SOURCE, "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                match Self::create_debug_messenger(&entry, &instance, config) {
                    Ok(messenger) => Some(messenger),
                    Err(err) => {
                        instance.destroy_instance(None);
                        return Err(err);
                    }
                }
            } else {
                None
            };

            let created = Self::create_device_objects(&instance);
            let (graphics_queue_family, device, allocator, upload_command_pool) =
                match created {
                    Ok(objects) => objects,
                    Err(err) => {
                        #[cfg(feature = "vulkan-validation")]
                        {
                            if let Some((debug_utils, messenger)) = &debug_messenger {
                                crate::debug::cleanup_debug_filter();
                                debug_utils.destroy_debug_utils_messenger(*messenger, None);
                            }
                        }
                        instance.destroy_instance(None);
                        return Err(err);
                    }
                };

            let graphics_queue = device.get_device_queue(graphics_queue_family, 0);

            Ok(Self {
                _entry: entry,
                instance,
                device,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                graphics_queue,
                graphics_queue_family,
                upload_command_pool,
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
            })
        }
    }

    fn validation_requested(config: &Config) -> bool {
        #[cfg(feature = "vulkan-validation")]
        {
            config.enable_validation
        }
        #[cfg(not(feature = "vulkan-validation"))]
        {
            if config.enable_validation {
                gfx_warn!(SOURCE, "Validation requested but the crate was built without the vulkan-validation feature");
            }
            false
        }
    }

    #[cfg(feature = "vulkan-validation")]
    fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &Config,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        unsafe {
            let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
            crate::debug::init_debug_filter(config.debug_severity);

            let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(config.debug_severity.message_severity_flags())
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                )
                .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

            let messenger = debug_utils
                .create_debug_utils_messenger(&debug_info, None)
                .map_err(|e| {
                    gfx_error!(SOURCE, "Failed to create debug messenger: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                })?;

            Ok((debug_utils, messenger))
        }
    }

    /// Pick a physical device and create the logical device, allocator and upload pool
    fn create_device_objects(
        instance: &ash::Instance,
    ) -> Result<(u32, ash::Device, Allocator, vk::CommandPool)> {
        unsafe {
            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| {
                    gfx_error!(SOURCE, "Failed to enumerate physical devices: {:?}", e);
                    Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
                })?;

            // First device exposing a graphics queue, discrete GPUs preferred
            let mut candidates: Vec<(vk::PhysicalDevice, u32, bool)> = physical_devices
                .into_iter()
                .filter_map(|physical_device| {
                    let family = instance
                        .get_physical_device_queue_family_properties(physical_device)
                        .iter()
                        .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))? as u32;
                    let properties = instance.get_physical_device_properties(physical_device);
                    let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
                    Some((physical_device, family, discrete))
                })
                .collect();
            candidates.sort_by_key(|&(_, _, discrete)| !discrete);

            let (physical_device, graphics_queue_family, _) = candidates
                .into_iter()
                .next()
                .ok_or_else(|| {
                    gfx_error!(SOURCE, "No Vulkan-capable GPU with a graphics queue found");
                    Error::InitializationFailed("No Vulkan-capable GPU found".to_string())
                })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());
            gfx_info!(SOURCE, "Selected GPU: {}", name);

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_queue_family)
                .queue_priorities(&queue_priorities)];

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    gfx_error!(SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    gfx_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
                    device.destroy_device(None);
                    return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
                }
            };

            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let upload_command_pool = match device.create_command_pool(&upload_pool_create_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    gfx_error!(SOURCE, "Failed to create upload command pool: {:?}", e);
                    drop(allocator);
                    device.destroy_device(None);
                    return Err(Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e)));
                }
            };

            Ok((graphics_queue_family, device, allocator, upload_command_pool))
        }
    }

    /// Record commands into a one-shot command buffer, submit and wait for completion
    pub(crate) fn submit_one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.upload_command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = self.device.allocate_command_buffers(&allocate_info)
                .map_err(|e| gfx_err!(SOURCE, "Failed to allocate transfer command buffer: {:?}", e))?;

            let result = self.record_and_submit(command_buffers[0], record);
            self.device.free_command_buffers(self.upload_command_pool, &command_buffers);
            result
        }
    }

    fn record_and_submit<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.device.begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| gfx_err!(SOURCE, "Failed to begin transfer command buffer: {:?}", e))?;

            record(&self.device, command_buffer);

            // Make transfer writes visible to host reads of mapped memory
            let barrier = vk::MemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::HOST_READ);
            self.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::HOST,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            );

            self.device.end_command_buffer(command_buffer)
                .map_err(|e| gfx_err!(SOURCE, "Failed to end transfer command buffer: {:?}", e))?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default()
                .command_buffers(&command_buffers);

            self.device.queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| gfx_err!(SOURCE, "Failed to submit transfer: {:?}", e))?;

            self.device.queue_wait_idle(self.graphics_queue)
                .map_err(|e| gfx_err!(SOURCE, "Failed to wait for transfer completion: {:?}", e))
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            self.device.destroy_command_pool(self.upload_command_pool, None);

            // Free VkDeviceMemory pages BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);

            #[cfg(feature = "vulkan-validation")]
            {
                if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                    crate::debug::cleanup_debug_filter();
                    debug_utils.destroy_debug_utils_messenger(messenger, None);
                }
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
