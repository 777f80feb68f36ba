//! Frame orchestration
//!
//! [`VulkanRenderingEngine`] owns the window, the render context, the
//! swapchain and the per-frame-slot command buffers and sync objects, and
//! drives the acquire → record → submit → present cycle. The frame loop is
//! single-threaded: one thread constructs the engine and calls
//! [`VulkanRenderingEngine::draw_frame`] once per game-loop iteration;
//! GPU parallelism is coordinated entirely through fences and semaphores.

use ash::vk;
use bytemuck::Pod;
use std::rc::Rc;

use crate::core::config::EngineConfig;

use super::buffer::Buffer;
use super::commands::CommandBuffer;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::image::Image;
use super::pipeline::{Pipeline, PipelineSettings, ShaderDefinition};
use super::pipeline_manager::PipelineManager;
use super::swapchain::Swapchain;
use super::sync::FrameSyncObjects;
use super::window::Window;

/// Number of frames the CPU may record ahead of the GPU
///
/// Three slots keep the CPU from stalling on the GPU in the common case.
/// Acquire is ordered by the image-available semaphore alone; no separate
/// acquire fence is kept.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Per-object render hook invoked inside the frame's render pass
///
/// Receives the active command buffer, the current frame-slot index and the
/// render context for recording. The callback must not begin or end the
/// render pass and must not submit or present; it only records draw calls.
pub type RenderCallback = Box<dyn FnMut(vk::CommandBuffer, usize, &VulkanContext)>;

/// The Vulkan rendering engine and frame orchestrator
pub struct VulkanRenderingEngine {
    // Dropped top to bottom: GPU resources go before the context, the
    // context (and with it the surface) before the window
    swapchain: Swapchain,
    command_buffers: Vec<CommandBuffer>,
    sync_objects: Vec<FrameSyncObjects>,
    pipeline_manager: PipelineManager,
    render_callback: Option<RenderCallback>,
    current_frame: usize,
    frame_counter: u64,
    framebuffer_resized: bool,
    pending_resize: Option<vk::Extent2D>,
    context: VulkanContext,
    window: Window,
}

impl VulkanRenderingEngine {
    /// Create the engine: window, context, swapchain, per-slot command
    /// buffers and sync objects
    pub fn new(config: &EngineConfig) -> VulkanResult<Self> {
        let mut window = Window::new(
            &config.window.title,
            config.window.width,
            config.window.height,
            config.window.resizable,
        )
        .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        let context = VulkanContext::new(
            &mut window,
            &config.window.title,
            config.renderer.enable_validation,
        )?;

        let (fb_width, fb_height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            &context,
            vk::Extent2D {
                width: fb_width,
                height: fb_height,
            },
            config.renderer.vsync,
        )?;

        let mut command_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut sync_objects = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            command_buffers.push(CommandBuffer::new(
                context.device_clone(),
                context.command_pool(),
            )?);
            sync_objects.push(FrameSyncObjects::new(context.device_clone())?);
        }

        log::info!(
            "Rendering engine initialized with {} frames in flight",
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            swapchain,
            command_buffers,
            sync_objects,
            pipeline_manager: PipelineManager::new(MAX_FRAMES_IN_FLIGHT),
            render_callback: None,
            current_frame: 0,
            frame_counter: 0,
            framebuffer_resized: false,
            pending_resize: None,
            context,
            window,
        })
    }

    /// Install the per-object render callback
    pub fn set_render_callback(&mut self, callback: RenderCallback) {
        self.render_callback = Some(callback);
    }

    /// Signal that the framebuffer was resized
    ///
    /// Consumed on the next [`draw_frame`](Self::draw_frame) call, which
    /// recreates the swapchain. Not synchronized against an in-progress
    /// frame — call from the thread driving the frame loop.
    pub fn signal_framebuffer_resize(&mut self, width: u32, height: u32) {
        self.framebuffer_resized = true;
        self.pending_resize = Some(vk::Extent2D { width, height });
    }

    /// Draw one frame
    ///
    /// Waits for the current slot's fence, acquires a swapchain image,
    /// re-records the slot's command buffer around the render callback,
    /// submits, presents and advances the slot index. Out-of-date and
    /// suboptimal swapchain reports (and a pending resize signal) trigger
    /// recreation and skip the frame; every other native failure is fatal
    /// and propagates.
    pub fn draw_frame(&mut self) -> VulkanResult<()> {
        self.sync_objects[self.current_frame]
            .in_flight
            .wait(u64::MAX)?;

        let acquire_result = unsafe {
            self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                self.sync_objects[self.current_frame].image_available.handle(),
                vk::Fence::null(),
            )
        };

        let image_index = match acquire_result {
            Ok((_, true)) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date or suboptimal during acquire, recreating");
                self.recreate_swapchain()?;
                return Ok(());
            }
            Ok((index, false)) => {
                if self.framebuffer_resized {
                    log::warn!("Framebuffer resize signaled, recreating swapchain");
                    self.recreate_swapchain()?;
                    return Ok(());
                }
                index
            }
            Err(e) => return Err(VulkanError::Api(e)),
        };

        // The frame will be submitted from here on; only now may the fence
        // be reset, otherwise a skipped frame would deadlock this slot
        self.sync_objects[self.current_frame].in_flight.reset()?;

        self.record_frame(image_index)?;

        let sync = &self.sync_objects[self.current_frame];
        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffers[self.current_frame].handle()];
        let signal_semaphores = [sync.present_ready.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .device()
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info.build()],
                    sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present_result = unsafe {
            self.swapchain
                .loader()
                .queue_present(self.context.present_queue(), &present_info)
        };

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        self.frame_counter += 1;

        match present_result {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date or suboptimal during present, recreating");
                self.recreate_swapchain()
            }
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Reset and re-record the current slot's command buffer
    fn record_frame(&mut self, image_index: u32) -> VulkanResult<()> {
        let command_buffer = &mut self.command_buffers[self.current_frame];
        command_buffer.reset()?;
        command_buffer.begin(vk::CommandBufferUsageFlags::empty())?;
        let cmd = command_buffer.handle();

        let device = self.context.device();
        let extent = self.swapchain.extent();

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(self.swapchain.render_pass().handle())
            .framebuffer(self.swapchain.framebuffer(image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(cmd, &render_pass_begin, vk::SubpassContents::INLINE);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_set_scissor(cmd, 0, &[scissor]);
        }

        // Hand off to the scene layer for the actual draw calls
        if let Some(callback) = self.render_callback.as_mut() {
            callback(cmd, self.current_frame, &self.context);
        }

        unsafe {
            self.context.device().cmd_end_render_pass(cmd);
        }

        self.command_buffers[self.current_frame].end()
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<()> {
        self.context.wait_idle()?;

        let extent = self.pending_resize.take().unwrap_or_else(|| {
            let (width, height) = self.window.get_framebuffer_size();
            vk::Extent2D { width, height }
        });

        // A minimized window has a zero-area framebuffer; keep the resize
        // flag set and try again next frame
        if extent.width == 0 || extent.height == 0 {
            self.pending_resize = Some(extent);
            return Ok(());
        }

        self.swapchain.recreate(&self.context, extent)?;
        self.framebuffer_resized = false;
        Ok(())
    }

    /// Get a pipeline (and a fresh user slot) for the given settings
    pub fn get_pipeline(
        &mut self,
        settings: &PipelineSettings,
    ) -> VulkanResult<(usize, Rc<Pipeline>)> {
        self.pipeline_manager
            .get_pipeline(&self.context, self.swapchain.render_pass(), settings)
    }

    /// Default pipeline settings resolved against the configured shader pair
    pub fn default_pipeline_settings(&self, shader: ShaderDefinition) -> PipelineSettings {
        PipelineSettings::default_with_shader(shader)
    }

    /// Create a device-local vertex buffer via the staged-upload path
    ///
    /// Blocking; load-time use only.
    pub fn create_vertex_buffer<T: Pod>(&self, vertices: &[T]) -> VulkanResult<Buffer> {
        Buffer::vertex_from_data(&self.context, vertices)
    }

    /// Create a host-visible staging buffer pre-filled with `data`
    pub fn create_staging_buffer_with_data(&self, data: &[u8]) -> VulkanResult<Buffer> {
        Buffer::staging_with_data(&self.context, data)
    }

    /// Create a 2D image (load-time resource path)
    pub fn create_image(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> VulkanResult<Image> {
        Image::new(
            &self.context,
            extent,
            vk::SampleCountFlags::TYPE_1,
            format,
            vk::ImageTiling::OPTIMAL,
            usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    /// Record and submit an immediate copy of a buffer into an image
    ///
    /// The image must already be in TRANSFER_DST_OPTIMAL layout.
    pub fn copy_buffer_to_image(&self, buffer: &Buffer, image: &Image) -> VulkanResult<()> {
        let extent = image.extent();
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
        };

        let src = buffer.handle();
        let dst = image.handle();
        self.context.immediate_submit(|cmd| unsafe {
            self.context.device().cmd_copy_buffer_to_image(
                cmd,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        })
    }

    /// Block until the device is idle
    pub fn sync_device_wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    /// Get the render context
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    /// Get the window
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Get mutable access to the window (event polling)
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    /// Current swapchain extent
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Current frame-slot index (`frame_counter % MAX_FRAMES_IN_FLIGHT`)
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Total frames successfully submitted
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Number of frame slots
    pub fn max_frames_in_flight(&self) -> usize {
        MAX_FRAMES_IN_FLIGHT
    }
}

impl Drop for VulkanRenderingEngine {
    fn drop(&mut self) {
        log::info!("Rendering engine shutting down");
        // All in-flight work must retire before any owned resource dies
        let _ = self.context.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_slots_cycle_through_all_indices() {
        let mut frame = 0usize;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(frame);
            frame = (frame + 1) % MAX_FRAMES_IN_FLIGHT;
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn frame_counter_and_slot_index_stay_in_lockstep() {
        let mut counter = 0u64;
        let mut frame = 0usize;
        for _ in 0..7 {
            assert_eq!(frame, (counter % MAX_FRAMES_IN_FLIGHT as u64) as usize);
            frame = (frame + 1) % MAX_FRAMES_IN_FLIGHT;
            counter += 1;
        }
    }
}
