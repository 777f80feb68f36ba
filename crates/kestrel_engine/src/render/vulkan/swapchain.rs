//! Vulkan swapchain management
//!
//! The swapchain owns everything tied to the surface: presentable images
//! and views, the MSAA color and depth targets, the render pass compatible
//! with the surface format, and one framebuffer per image. It is recreated
//! wholesale on resize or an out-of-date report; the render pass survives
//! recreation since the surface format does not change.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::image::Image;
use super::render_pass::RenderPass;

/// Pick the presentation extent from surface capabilities, clamping the
/// window's framebuffer size when the surface leaves it to us
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: window_extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: window_extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Pick the present mode: FIFO when vsync is requested, otherwise MAILBOX
/// when available with FIFO as the always-supported fallback
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    vsync: bool,
) -> vk::PresentModeKHR {
    if vsync {
        vk::PresentModeKHR::FIFO
    } else {
        available
            .iter()
            .copied()
            .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO)
    }
}

/// Swapchain plus the surface-sized attachments and framebuffers
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    // Multisampled color target; absent when the device only supports 1x
    color_image: Option<Image>,
    depth_image: Image,
    framebuffers: Vec<vk::Framebuffer>,
    render_pass: RenderPass,
    vsync: bool,
}

impl Swapchain {
    /// Create the swapchain and all surface-sized resources
    pub fn new(ctx: &VulkanContext, window_extent: vk::Extent2D, vsync: bool) -> VulkanResult<Self> {
        let swapchain_loader = SwapchainLoader::new(ctx.instance(), ctx.device());

        let (swapchain, images, format, extent) = Self::create_swapchain(
            ctx,
            &swapchain_loader,
            window_extent,
            vsync,
            vk::SwapchainKHR::null(),
        )?;

        let image_views = Self::create_image_views(ctx.device(), &images, format.format)?;

        let samples = ctx.physical_device().msaa_samples;
        let depth_format = ctx.physical_device().depth_format;
        let render_pass = RenderPass::new(ctx.device_clone(), format.format, depth_format, samples)?;

        let (color_image, depth_image) = Self::create_attachments(ctx, extent, format.format)?;

        let framebuffers = Self::create_framebuffers(
            ctx.device(),
            render_pass.handle(),
            &image_views,
            color_image.as_ref(),
            &depth_image,
            extent,
        )?;

        log::info!(
            "Swapchain created: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            images.len(),
            format.format
        );

        Ok(Self {
            device: ctx.device_clone(),
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
            color_image,
            depth_image,
            framebuffers,
            render_pass,
            vsync,
        })
    }

    fn create_swapchain(
        ctx: &VulkanContext,
        swapchain_loader: &SwapchainLoader,
        window_extent: vk::Extent2D,
        vsync: bool,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<(vk::SwapchainKHR, Vec<vk::Image>, vk::SurfaceFormatKHR, vk::Extent2D)> {
        let physical = ctx.physical_device().device;
        let surface = ctx.surface();
        let surface_loader = ctx.surface_loader();

        let surface_caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical, surface)
                .map_err(VulkanError::Api)?
        };

        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical, surface)
                .map_err(VulkanError::Api)?
        };

        let format = surface_formats
            .iter()
            .find(|sf| {
                sf.format == vk::Format::B8G8R8A8_SRGB
                    && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .copied()
            .unwrap_or(surface_formats[0]);

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let present_mode = choose_present_mode(&present_modes, vsync);

        let extent = choose_extent(&surface_caps, window_extent);

        let image_count = (surface_caps.min_image_count + 1).min(
            if surface_caps.max_image_count > 0 {
                surface_caps.max_image_count
            } else {
                surface_caps.min_image_count + 1
            },
        );

        let queue_families = ctx.physical_device().queue_families;
        let family_indices = [queue_families.graphics, queue_families.present];

        let mut swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // Images shared across distinct graphics/present families need
        // concurrent mode
        swapchain_create_info = if queue_families.graphics != queue_families.present {
            swapchain_create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            swapchain_create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        Ok((swapchain, images, format, extent))
    }

    fn create_image_views(
        device: &Device,
        images: &[vk::Image],
        format: vk::Format,
    ) -> VulkanResult<Vec<vk::ImageView>> {
        images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe {
                    device
                        .create_image_view(&create_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    fn create_attachments(
        ctx: &VulkanContext,
        extent: vk::Extent2D,
        color_format: vk::Format,
    ) -> VulkanResult<(Option<Image>, Image)> {
        let samples = ctx.physical_device().msaa_samples;
        let depth_format = ctx.physical_device().depth_format;

        let color_image = if samples != vk::SampleCountFlags::TYPE_1 {
            let mut image = Image::new(
                ctx,
                extent,
                samples,
                color_format,
                vk::ImageTiling::OPTIMAL,
                vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;
            image.add_image_view(vk::ImageAspectFlags::COLOR)?;
            Some(image)
        } else {
            None
        };

        let mut depth_image = Image::new(
            ctx,
            extent,
            samples,
            depth_format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        depth_image.add_image_view(vk::ImageAspectFlags::DEPTH)?;

        Ok((color_image, depth_image))
    }

    fn create_framebuffers(
        device: &Device,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        color_image: Option<&Image>,
        depth_image: &Image,
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        let depth_view = depth_image
            .view()
            .expect("depth image view created at swapchain construction");

        image_views
            .iter()
            .map(|&swapchain_view| {
                // Attachment order must match the render pass: with MSAA the
                // swapchain image is the resolve target
                let attachments: Vec<vk::ImageView> = match color_image {
                    Some(color) => vec![
                        color.view().expect("msaa color view created"),
                        depth_view,
                        swapchain_view,
                    ],
                    None => vec![swapchain_view, depth_view],
                };

                let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);

                unsafe {
                    device
                        .create_framebuffer(&framebuffer_create_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    /// Recreate the swapchain for a new window extent
    ///
    /// The caller must have waited the device idle first. Surface-sized
    /// resources are torn down and rebuilt; the render pass is kept.
    pub fn recreate(&mut self, ctx: &VulkanContext, window_extent: vk::Extent2D) -> VulkanResult<()> {
        self.cleanup_surface_resources();

        let (swapchain, images, format, extent) = Self::create_swapchain(
            ctx,
            &self.swapchain_loader,
            window_extent,
            self.vsync,
            self.swapchain,
        )?;

        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }

        self.swapchain = swapchain;
        self.images = images;
        self.format = format;
        self.extent = extent;

        self.image_views = Self::create_image_views(ctx.device(), &self.images, format.format)?;

        let (color_image, depth_image) = Self::create_attachments(ctx, extent, format.format)?;
        self.color_image = color_image;
        self.depth_image = depth_image;

        self.framebuffers = Self::create_framebuffers(
            ctx.device(),
            self.render_pass.handle(),
            &self.image_views,
            self.color_image.as_ref(),
            &self.depth_image,
            extent,
        )?;

        log::info!(
            "Swapchain recreated: {}x{}, {} images",
            extent.width,
            extent.height,
            self.images.len()
        );

        Ok(())
    }

    fn cleanup_surface_resources(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.framebuffers.clear();

            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.image_views.clear();
        }
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get the render pass compatible with this swapchain
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    /// Get the framebuffer for a swapchain image index
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get swapchain loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Get the number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.cleanup_surface_resources();
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn extent_uses_surface_current_extent_when_fixed() {
        let capabilities = caps((800, 600), (1, 1), (4096, 4096));
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 300,
                height: 300,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn extent_clamps_window_size_when_surface_is_flexible() {
        let capabilities = caps((u32::MAX, u32::MAX), (640, 480), (1920, 1080));
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 300,
                height: 2000,
            },
        );
        assert_eq!((extent.width, extent.height), (640, 1080));
    }

    #[test]
    fn vsync_prefers_fifo() {
        let available = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&available, true),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn no_vsync_prefers_mailbox_with_fifo_fallback() {
        let with_mailbox = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&with_mailbox, false),
            vk::PresentModeKHR::MAILBOX
        );

        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&fifo_only, false),
            vk::PresentModeKHR::FIFO
        );
    }
}
