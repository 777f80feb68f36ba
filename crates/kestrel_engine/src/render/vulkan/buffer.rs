//! Buffer wrappers for vertex data, staging uploads and uniforms
//!
//! Every buffer owns its VMA allocation and frees it on drop. A buffer must
//! not be destroyed while a command buffer referencing it is still in
//! flight; the staged-upload and copy helpers below enforce that internally
//! by blocking until their transfer completes.

use ash::vk;
use bytemuck::Pod;
use std::rc::Rc;

use super::allocator::MemoryAllocator;
use super::context::{VulkanContext, VulkanResult};

/// GPU buffer with its backing allocation
pub struct Buffer {
    allocator: Rc<MemoryAllocator>,
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: vk::DeviceSize,
    mapped: Option<*mut u8>,
    host_visible: bool,
}

impl Buffer {
    /// Create a buffer with the given usage and memory properties
    pub fn new(
        ctx: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        alloc_flags: vk_mem::AllocationCreateFlags,
    ) -> VulkanResult<Self> {
        let allocator = Rc::clone(ctx.allocator());
        let (buffer, allocation) = allocator.create_buffer(size, usage, properties, alloc_flags)?;

        Ok(Self {
            allocator,
            buffer,
            allocation,
            size,
            mapped: None,
            host_visible: properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE),
        })
    }

    /// Create a host-visible staging buffer and fill it with `data`
    pub fn staging_with_data(ctx: &VulkanContext, data: &[u8]) -> VulkanResult<Self> {
        let mut buffer = Self::new(
            ctx,
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
        )?;

        buffer.write_bytes(data)?;
        Ok(buffer)
    }

    /// Create a device-local vertex buffer from vertex data via the staged
    /// upload path
    ///
    /// A temporary host-visible staging buffer is filled, copied into the
    /// device-local buffer with a blocking transfer, then destroyed. Safe to
    /// call at load time only.
    pub fn vertex_from_data<T: Pod>(ctx: &VulkanContext, vertices: &[T]) -> VulkanResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);

        let staging = Self::staging_with_data(ctx, bytes)?;

        let vertex_buffer = Self::new(
            ctx,
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk_mem::AllocationCreateFlags::empty(),
        )?;

        vertex_buffer.copy_from(ctx, &staging, bytes.len() as vk::DeviceSize)?;

        // The copy has completed on the GPU, so dropping the staging buffer
        // here cannot race the transfer
        drop(staging);

        Ok(vertex_buffer)
    }

    /// Create a persistently mapped uniform buffer
    pub fn uniform(ctx: &VulkanContext, size: vk::DeviceSize) -> VulkanResult<Self> {
        let mut buffer = Self::new(
            ctx,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
        )?;

        buffer.map_memory()?;
        Ok(buffer)
    }

    /// Map the buffer memory for CPU access
    ///
    /// Panics if the buffer was created device-local without host access;
    /// mapping such a buffer is a programming error.
    pub fn map_memory(&mut self) -> VulkanResult<*mut u8> {
        assert!(
            self.host_visible,
            "attempted to map a device-local-only buffer"
        );

        if let Some(ptr) = self.mapped {
            return Ok(ptr);
        }

        let ptr = self.allocator.map_memory(&mut self.allocation)?;
        self.mapped = Some(ptr);
        Ok(ptr)
    }

    /// Unmap previously mapped memory
    pub fn unmap_memory(&mut self) {
        if self.mapped.take().is_some() {
            self.allocator.unmap_memory(&mut self.allocation);
        }
    }

    /// Write raw bytes into the buffer through a scoped mapping
    pub fn write_bytes(&mut self, data: &[u8]) -> VulkanResult<()> {
        debug_assert!(data.len() as vk::DeviceSize <= self.size);

        let was_mapped = self.mapped.is_some();
        let ptr = self.map_memory()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
        }
        if !was_mapped {
            self.unmap_memory();
        }
        Ok(())
    }

    /// Write typed data into the buffer
    pub fn write_data<T: Pod>(&mut self, data: &[T]) -> VulkanResult<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    /// Read the buffer contents back through a scoped mapping
    pub fn read_bytes(&mut self, len: usize) -> VulkanResult<Vec<u8>> {
        debug_assert!(len as vk::DeviceSize <= self.size);

        let was_mapped = self.mapped.is_some();
        let ptr = self.map_memory()?;
        let mut out = vec![0u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr, out.as_mut_ptr(), len);
        }
        if !was_mapped {
            self.unmap_memory();
        }
        Ok(out)
    }

    /// Record and submit an immediate copy of `size` bytes from `src` into
    /// this buffer, blocking until the transfer completes
    pub fn copy_from(&self, ctx: &VulkanContext, src: &Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        let region = vk::BufferCopy::builder().size(size).build();
        let src_handle = src.handle();
        let dst_handle = self.buffer;

        ctx.immediate_submit(|cmd| unsafe {
            ctx.device().cmd_copy_buffer(cmd, src_handle, dst_handle, &[region]);
        })
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get the buffer size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Get the persistent mapped pointer, if the buffer is mapped
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        self.mapped
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.mapped.take().is_some() {
            self.allocator.unmap_memory(&mut self.allocation);
        }
        self.allocator.destroy_buffer(self.buffer, &mut self.allocation);
    }
}
