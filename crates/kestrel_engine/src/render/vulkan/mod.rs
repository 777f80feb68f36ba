//! Vulkan rendering backend
//!
//! Low-level wrappers over the explicit API plus the frame orchestrator.
//! Construction order mirrors ownership: context first, then swapchain and
//! pipelines, with the engine tying them together.

/// GPU memory allocation through VMA
pub mod allocator;
/// Buffer wrappers and staged uploads
pub mod buffer;
/// Command pool and command buffer recording
pub mod commands;
/// Instance, device selection and the render context
pub mod context;
/// Frame orchestration
pub mod engine;
/// Image wrapper with tracked layout state
pub mod image;
/// Graphics pipeline and per-user descriptor state
pub mod pipeline;
/// Pipeline cache
pub mod pipeline_manager;
/// Render pass management
pub mod render_pass;
/// SPIR-V shader loading
pub mod shader;
/// Swapchain and surface-sized resources
pub mod swapchain;
/// Synchronization primitives
pub mod sync;
/// Sampled texture image
pub mod texture;
/// GLFW window wrapper
pub mod window;

pub use allocator::MemoryAllocator;
pub use buffer::Buffer;
pub use commands::{CommandBuffer, CommandPool};
pub use context::{
    LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices, VulkanContext, VulkanError,
    VulkanInstance, VulkanResult, WindowSurface,
};
pub use engine::{RenderCallback, VulkanRenderingEngine, MAX_FRAMES_IN_FLIGHT};
pub use image::{transition_masks, BarrierMasks, Image};
pub use pipeline::{
    DescriptorLayoutSettings, Pipeline, PipelineSettings, ShaderDefinition, MAX_PIPELINE_USERS,
};
pub use pipeline_manager::PipelineManager;
pub use render_pass::RenderPass;
pub use shader::ShaderModule;
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSyncObjects, Semaphore};
pub use texture::TextureImage;
pub use window::{Window, WindowError};
