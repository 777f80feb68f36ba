//! Texture creation from decoded image data
//!
//! Decode (PNG) → staging buffer → device-local image via the two supported
//! layout transitions → sampler attach. Everything here blocks on the GPU
//! and is for load-time use only; failures propagate so the asset layer can
//! decide whether to abort the load or the process.

use ash::vk;
use std::path::Path;
use thiserror::Error;

use crate::render::vulkan::{TextureImage, VulkanError, VulkanRenderingEngine};

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Image file could not be read or decoded
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// GPU-side resource creation failed
    #[error(transparent)]
    Vulkan(#[from] VulkanError),
}

/// Load a PNG file into a sampled, shader-readable texture
pub fn load_texture_png<P: AsRef<Path>>(
    engine: &VulkanRenderingEngine,
    path: P,
) -> Result<TextureImage, AssetError> {
    let decoded = image::open(&path)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    let pixels = decoded.into_raw();

    log::debug!(
        "Loaded texture {} ({}x{})",
        path.as_ref().display(),
        width,
        height
    );

    upload_rgba(engine, width, height, &pixels)
}

/// Create a 1x1 solid-color texture, used as a placeholder or fallback
pub fn solid_color_texture(
    engine: &VulkanRenderingEngine,
    rgba: [u8; 4],
) -> Result<TextureImage, AssetError> {
    upload_rgba(engine, 1, 1, &rgba)
}

fn upload_rgba(
    engine: &VulkanRenderingEngine,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<TextureImage, AssetError> {
    let staging = engine.create_staging_buffer_with_data(pixels)?;

    let extent = vk::Extent2D { width, height };
    let mut image = engine.create_image(
        extent,
        vk::Format::R8G8B8A8_SRGB,
        vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
    )?;

    image.transition_layout(engine.context(), vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
    engine.copy_buffer_to_image(&staging, &image)?;
    image.transition_layout(engine.context(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)?;

    image.add_image_view(vk::ImageAspectFlags::COLOR)?;

    let mut texture = TextureImage::new(engine.context(), image);
    texture.attach_sampler(engine.context())?;

    Ok(texture)
}
