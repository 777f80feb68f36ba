//! Command pool and command buffer management
//!
//! Two recording modes: per-frame buffers that the engine resets and
//! re-records each frame, and immediate single-use buffers that block until
//! the GPU finishes (load-time uploads and layout transitions only).

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool on the given queue family
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // All buffers from this pool must be off the GPU before the pool dies
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Primary command buffer with RAII cleanup
///
/// Must be reset before re-recording; beginning a buffer that is already
/// recording is a programmer error and panics.
pub struct CommandBuffer {
    device: Device,
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    recording: bool,
}

impl CommandBuffer {
    /// Allocate a primary command buffer from the pool
    pub fn new(device: Device, pool: &CommandPool) -> VulkanResult<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers = unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            pool: pool.handle(),
            command_buffer: command_buffers[0],
            recording: false,
        })
    }

    /// Get the command buffer handle
    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Begin recording
    pub fn begin(&mut self, flags: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        assert!(
            !self.recording,
            "command buffer begun twice without an intervening reset"
        );

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe {
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        self.recording = true;
        Ok(())
    }

    /// End recording
    pub fn end(&mut self) -> VulkanResult<()> {
        assert!(self.recording, "command buffer ended while not recording");

        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }

        self.recording = false;
        Ok(())
    }

    /// Reset the buffer to its initial state so it can be re-recorded
    pub fn reset(&mut self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
        }
        self.recording = false;
        Ok(())
    }

    /// Record commands with the provided closure, submit to `queue` and
    /// block until the queue drains
    ///
    /// Load-time path for buffer copies and layout transitions; never used
    /// in the hot per-frame loop.
    pub fn record_single_time<F>(mut self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        self.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        record(self.command_buffer);
        self.end()?;

        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device
                .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device.queue_wait_idle(queue).map_err(VulkanError::Api)?;
        }

        Ok(())
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .free_command_buffers(self.pool, &[self.command_buffer]);
        }
    }
}
