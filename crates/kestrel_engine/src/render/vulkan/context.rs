//! Vulkan context management
//!
//! Instance creation, physical device selection and the process-wide render
//! context that every other component borrows. Construction failures here are
//! startup-only and fatal; nothing below retries device selection.

use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use std::rc::Rc;
use thiserror::Error;

use super::allocator::MemoryAllocator;
use super::commands::{CommandBuffer, CommandPool};
use super::window::Window;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device satisfies the minimum requirements
    #[error("No suitable physical device found")]
    NoSuitableDevice,

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// GPU memory allocation failed
    #[error("GPU allocation failed ({requested} bytes): {result:?}")]
    ResourceExhausted {
        /// Number of bytes that were requested
        requested: u64,
        /// Native result reported by the allocator
        result: vk::Result,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Shader bytecode could not be loaded
    #[error("Failed to load shader {path}: {message}")]
    ShaderLoad {
        /// Path of the shader file
        path: String,
        /// Underlying failure description
        message: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    #[cfg(debug_assertions)]
    debug_utils: Option<DebugUtils>,
    #[cfg(debug_assertions)]
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, optionally with validation layers
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("Invalid application name".to_string()))?;
        let engine_name_cstr = CString::new("KestrelEngine").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_2);

        // GLFW reports the platform surface extensions
        let required_extensions = window.get_required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}"))
        })?;

        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()).unwrap())
            .collect();

        #[allow(unused_mut)]
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if cfg!(debug_assertions) && enable_validation {
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        log::info!("Vulkan instance created ({} extensions)", extensions.len());

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let debug_messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(debug_messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(debug_messenger)) =
                (&self.debug_utils, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*debug_messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Queue family indices for graphics and presentation (may alias)
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyIndices {
    /// Family with graphics support
    pub graphics: u32,
    /// Family with presentation support for the engine's surface
    pub present: u32,
}

/// Selected physical device plus the capabilities the renderer cares about
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Chosen queue families
    pub queue_families: QueueFamilyIndices,
    /// Maximum usable sample count for color+depth framebuffers
    pub msaa_samples: vk::SampleCountFlags,
    /// Supported depth attachment format
    pub depth_format: vk::Format,
}

impl PhysicalDeviceInfo {
    /// Select the best physical device for the given surface
    ///
    /// Requires graphics + present queues, swapchain support and anisotropic
    /// filtering. Discrete GPUs are preferred over integrated ones.
    pub fn select(
        instance: &Instance,
        surface_loader: &SurfaceLoader,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let mut best: Option<(u32, Self)> = None;
        for device in devices {
            let Some(info) = Self::evaluate(instance, surface_loader, surface, device)? else {
                continue;
            };

            let score = match info.properties.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 2,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                _ => 0,
            };

            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, info));
            }
        }

        let (_, info) = best.ok_or(VulkanError::NoSuitableDevice)?;

        let device_name = unsafe { CStr::from_ptr(info.properties.device_name.as_ptr()) };
        log::info!(
            "Selected GPU: {} (graphics family {}, present family {}, {:?} samples)",
            device_name.to_string_lossy(),
            info.queue_families.graphics,
            info.queue_families.present,
            info.msaa_samples
        );

        Ok(info)
    }

    fn evaluate(
        instance: &Instance,
        surface_loader: &SurfaceLoader,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        if features.sampler_anisotropy == vk::FALSE {
            return Ok(None);
        }

        // Swapchain extension must be available
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain = extensions.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Ok(None);
        }

        // The surface must expose at least one format and present mode
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };
        if formats.is_empty() || present_modes.is_empty() {
            return Ok(None);
        }

        let Some(queue_families) = Self::find_queue_families(instance, surface_loader, surface, device)?
        else {
            return Ok(None);
        };

        let Some(depth_format) = find_supported_format(
            instance,
            device,
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            device,
            properties,
            features,
            queue_families,
            msaa_samples: max_usable_sample_count(&properties),
            depth_format,
        }))
    }

    fn find_queue_families(
        instance: &Instance,
        surface_loader: &SurfaceLoader,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Option<QueueFamilyIndices>> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics = None;
        let mut present = None;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics.is_none() {
                graphics = Some(index);
            }

            let supports_present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            if supports_present && present.is_none() {
                present = Some(index);
            }

            if graphics.is_some() && present.is_some() {
                break;
            }
        }

        Ok(match (graphics, present) {
            (Some(graphics), Some(present)) => Some(QueueFamilyIndices { graphics, present }),
            _ => None,
        })
    }
}

/// Find the first format from `candidates` supporting `features` with the given tiling
pub fn find_supported_format(
    instance: &Instance,
    device: vk::PhysicalDevice,
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        let props = unsafe { instance.get_physical_device_format_properties(device, format) };
        match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
            _ => props.optimal_tiling_features.contains(features),
        }
    })
}

fn max_usable_sample_count(properties: &vk::PhysicalDeviceProperties) -> vk::SampleCountFlags {
    let counts = properties.limits.framebuffer_color_sample_counts
        & properties.limits.framebuffer_depth_sample_counts;

    for candidate in [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ] {
        if counts.contains(candidate) {
            return candidate;
        }
    }

    vk::SampleCountFlags::TYPE_1
}

/// Logical device and its queues with RAII cleanup
pub struct LogicalDevice {
    /// Logical device handle
    pub device: Device,
    /// Graphics queue
    pub graphics_queue: vk::Queue,
    /// Present queue (may be the same as the graphics queue)
    pub present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Create the logical device from the selected physical device
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let mut unique_families = vec![physical.queue_families.graphics];
        if physical.queue_families.present != physical.queue_families.graphics {
            unique_families.push(physical.queue_families.present);
        }

        let queue_priority = [1.0_f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priority)
                    .build()
            })
            .collect();

        let extension_names = [SwapchainLoader::name().as_ptr()];
        let enabled_features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&enabled_features);

        let device = unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical.queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.queue_families.present, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Presentation surface with RAII cleanup
pub struct WindowSurface {
    /// Surface extension loader
    pub loader: SurfaceLoader,
    /// Surface handle
    pub surface: vk::SurfaceKHR,
}

impl WindowSurface {
    /// Create a surface for the given window
    pub fn new(instance: &VulkanInstance, window: &mut Window) -> VulkanResult<Self> {
        let loader = SurfaceLoader::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation failed: {e}")))?;

        Ok(Self { loader, surface })
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Process-wide render context
///
/// Owns the instance, surface, device, allocator and the load-time command
/// pool. Constructed once at startup and passed by reference to every
/// component constructor; destroyed last, after all dependent resources.
/// Fields are declared in drop order: the pool and allocator go before the
/// device, the device before the surface and instance.
pub struct VulkanContext {
    command_pool: CommandPool,
    allocator: Rc<MemoryAllocator>,
    device: LogicalDevice,
    surface: WindowSurface,
    physical_device: PhysicalDeviceInfo,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Build the full context for a window
    pub fn new(window: &mut Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, enable_validation)?;
        let surface = WindowSurface::new(&instance, window)?;
        let physical_device =
            PhysicalDeviceInfo::select(&instance.instance, &surface.loader, surface.surface)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;
        let allocator = Rc::new(MemoryAllocator::new(
            &instance.instance,
            device.device.clone(),
            physical_device.device,
        )?);
        let command_pool = CommandPool::new(
            device.device.clone(),
            physical_device.queue_families.graphics,
        )?;

        Ok(Self {
            command_pool,
            allocator,
            device,
            surface,
            physical_device,
            instance,
        })
    }

    /// Get the logical device handle
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Get a clone of the logical device handle for RAII wrappers
    pub fn device_clone(&self) -> Device {
        self.device.device.clone()
    }

    /// Get the Vulkan instance handle
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the selected physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Get the surface loader
    pub fn surface_loader(&self) -> &SurfaceLoader {
        &self.surface.loader
    }

    /// Get the surface handle
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface.surface
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Get the shared GPU memory allocator
    pub fn allocator(&self) -> &Rc<MemoryAllocator> {
        &self.allocator
    }

    /// Get the load-time command pool
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Record and submit a one-off command buffer, blocking until the GPU
    /// finishes executing it
    ///
    /// Load-time path only; the per-frame loop records into pooled buffers.
    pub fn immediate_submit<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let command_buffer = CommandBuffer::new(self.device_clone(), &self.command_pool)?;
        command_buffer.record_single_time(self.device.graphics_queue, record)
    }

    /// Block until the device is idle (`SyncDeviceWaitIdle`)
    ///
    /// Full barrier used during teardown and forced swapchain recreation;
    /// must be called before destroying any resource a frame in flight may
    /// still reference.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)
        }
    }

    /// Fallback utility: walk the device memory types for one matching the
    /// filter and property flags
    ///
    /// Allocations normally go through [`MemoryAllocator`]; this remains for
    /// advanced cases such as probing custom depth formats.
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<u32> {
        let mem_properties = unsafe {
            self.instance
                .instance
                .get_physical_device_memory_properties(self.physical_device.device)
        };

        for i in 0..mem_properties.memory_type_count {
            if (type_filter & (1 << i)) != 0
                && mem_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
            {
                return Ok(i);
            }
        }

        Err(VulkanError::NoSuitableMemoryType)
    }
}
