//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences plus the per-frame-slot bundle
//! the engine cycles through. Semaphores order GPU work (acquire → render →
//! present); the in-flight fence keeps the CPU from re-recording a command
//! buffer the GPU is still consuming.

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally in the signaled state
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence signals
    ///
    /// The engine passes `u64::MAX`; a fence that never signals is a
    /// driver-level fatal condition, not a timeout to recover from.
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one frame-in-flight slot
///
/// Exactly one set is current at a time, selected by the frame counter
/// modulo the slot count. A slot's fence must have signaled before its
/// command buffer is re-recorded or its semaphores reassigned.
pub struct FrameSyncObjects {
    /// Signaled when the acquired swapchain image is ready to render into
    pub image_available: Semaphore,
    /// Signaled when rendering finishes and the image may be presented
    pub present_ready: Semaphore,
    /// Signaled when the GPU finishes this slot's command buffer
    pub in_flight: Fence,
}

impl FrameSyncObjects {
    /// Create the sync objects for one slot
    ///
    /// The fence starts signaled so the first wait on a fresh slot does not
    /// stall.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let present_ready = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            present_ready,
            in_flight,
        })
    }
}
