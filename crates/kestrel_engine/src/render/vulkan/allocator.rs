//! GPU memory allocation through VMA
//!
//! All buffer and image memory flows through [`MemoryAllocator`] so call
//! sites never walk memory-type bitmasks themselves; the raw
//! `find_memory_type` walk survives only as a fallback utility on the
//! context. Allocation failure is always surfaced as an error, never a null
//! handle.

use ash::{vk, Device, Instance};
use vk_mem::Alloc;

use super::context::{VulkanError, VulkanResult};

/// Wrapper around the VMA allocator bound to one logical device
///
/// A single instance exists per render context, shared via `Rc` so buffers
/// and images can release their allocations in `Drop`. Every owning wrapper
/// must be destroyed before the context tears the allocator down.
pub struct MemoryAllocator {
    allocator: vk_mem::Allocator,
}

impl MemoryAllocator {
    /// Create the allocator for a device
    pub fn new(
        instance: &Instance,
        device: Device,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<Self> {
        let create_info = vk_mem::AllocatorCreateInfo::new(instance, &device, physical_device);
        let allocator =
            unsafe { vk_mem::Allocator::new(create_info) }.map_err(VulkanError::Api)?;

        log::debug!("VMA allocator created");
        Ok(Self { allocator })
    }

    /// Create a buffer with bound memory
    ///
    /// `required_properties` selects the memory class (host-visible+coherent
    /// for staging, device-local for fast paths); `alloc_flags` controls host
    /// access and persistent mapping.
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        required_properties: vk::MemoryPropertyFlags,
        alloc_flags: vk_mem::AllocationCreateFlags,
    ) -> VulkanResult<(vk::Buffer, vk_mem::Allocation)> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: alloc_flags,
            required_flags: required_properties,
            ..Default::default()
        };

        unsafe { self.allocator.create_buffer(&buffer_info, &alloc_info) }.map_err(|result| {
            VulkanError::ResourceExhausted {
                requested: size,
                result,
            }
        })
    }

    /// Create an image with bound memory
    pub fn create_image(
        &self,
        image_info: &vk::ImageCreateInfo,
        required_properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<(vk::Image, vk_mem::Allocation)> {
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: vk_mem::AllocationCreateFlags::DEDICATED_MEMORY,
            required_flags: required_properties,
            ..Default::default()
        };

        let requested = u64::from(image_info.extent.width)
            * u64::from(image_info.extent.height)
            * u64::from(image_info.extent.depth);

        unsafe { self.allocator.create_image(image_info, &alloc_info) }.map_err(|result| {
            VulkanError::ResourceExhausted { requested, result }
        })
    }

    /// Destroy a buffer and free its allocation
    pub fn destroy_buffer(&self, buffer: vk::Buffer, allocation: &mut vk_mem::Allocation) {
        unsafe {
            self.allocator.destroy_buffer(buffer, allocation);
        }
    }

    /// Destroy an image and free its allocation
    pub fn destroy_image(&self, image: vk::Image, allocation: &mut vk_mem::Allocation) {
        unsafe {
            self.allocator.destroy_image(image, allocation);
        }
    }

    /// Map an allocation for CPU access
    pub fn map_memory(&self, allocation: &mut vk_mem::Allocation) -> VulkanResult<*mut u8> {
        unsafe { self.allocator.map_memory(allocation) }.map_err(VulkanError::Api)
    }

    /// Unmap a previously mapped allocation
    pub fn unmap_memory(&self, allocation: &mut vk_mem::Allocation) {
        unsafe {
            self.allocator.unmap_memory(allocation);
        }
    }
}
