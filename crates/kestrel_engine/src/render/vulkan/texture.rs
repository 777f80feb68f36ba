//! Sampled texture image
//!
//! An [`Image`] in shader-read-only layout plus the sampler renderers bind
//! alongside it. Created by the texture factory at load time.

use ash::{vk, Device};

use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::image::Image;

/// Image plus sampler usable from fragment shaders
pub struct TextureImage {
    device: Device,
    sampler: Option<vk::Sampler>,
    /// The underlying shader-readable image
    pub image: Image,
}

impl TextureImage {
    /// Wrap an uploaded image; the sampler is attached separately
    pub fn new(ctx: &VulkanContext, image: Image) -> Self {
        Self {
            device: ctx.device_clone(),
            sampler: None,
            image,
        }
    }

    /// Create and attach the sampler, once
    ///
    /// Linear filtering, repeat addressing, anisotropy at the device limit.
    pub fn attach_sampler(&mut self, ctx: &VulkanContext) -> VulkanResult<()> {
        if self.sampler.is_some() {
            return Ok(());
        }

        let max_anisotropy = ctx
            .physical_device()
            .properties
            .limits
            .max_sampler_anisotropy;

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

        let sampler = unsafe {
            self.device
                .create_sampler(&sampler_info, None)
                .map_err(VulkanError::Api)?
        };

        self.sampler = Some(sampler);
        Ok(())
    }

    /// Get the sampler, if attached
    pub fn sampler(&self) -> Option<vk::Sampler> {
        self.sampler
    }
}

impl Drop for TextureImage {
    fn drop(&mut self) {
        unsafe {
            if let Some(sampler) = self.sampler.take() {
                self.device.destroy_sampler(sampler, None);
            }
        }
    }
}
