//! Image wrapper with tracked layout state
//!
//! An [`Image`] owns its native handle, its allocation and an optional lazy
//! 2D view. The layout recorded in `current_layout` always matches the last
//! transition actually submitted; the barrier source masks are derived from
//! it, so the two must never drift apart.

use ash::{vk, Device};
use std::rc::Rc;

use super::allocator::MemoryAllocator;
use super::context::{VulkanContext, VulkanError, VulkanResult};

/// Access and stage masks for one supported layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierMasks {
    /// Source access mask
    pub src_access: vk::AccessFlags,
    /// Destination access mask
    pub dst_access: vk::AccessFlags,
    /// Source pipeline stage
    pub src_stage: vk::PipelineStageFlags,
    /// Destination pipeline stage
    pub dst_stage: vk::PipelineStageFlags,
}

/// Look up the barrier masks for an (old, new) layout pair
///
/// Only the transitions needed for texture upload are supported; `None`
/// means the pair is not in the table and the caller must treat the request
/// as a programming error.
pub fn transition_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Option<BarrierMasks> {
    match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Some(BarrierMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Some(BarrierMasks {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            })
        }
        _ => None,
    }
}

/// 2D image with bound memory, optional view and tracked layout
pub struct Image {
    device: Device,
    allocator: Rc<MemoryAllocator>,
    image: vk::Image,
    view: Option<vk::ImageView>,
    allocation: vk_mem::Allocation,
    format: vk::Format,
    current_layout: vk::ImageLayout,
    extent: vk::Extent2D,
}

impl Image {
    /// Create a 2D image with bound memory in the UNDEFINED layout
    pub fn new(
        ctx: &VulkanContext,
        extent: vk::Extent2D,
        num_samples: vk::SampleCountFlags,
        format: vk::Format,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(num_samples);

        let allocator = Rc::clone(ctx.allocator());
        let (image, allocation) =
            allocator.create_image(&image_info, properties)?;

        Ok(Self {
            device: ctx.device_clone(),
            allocator,
            image,
            view: None,
            allocation,
            format,
            current_layout: vk::ImageLayout::UNDEFINED,
            extent,
        })
    }

    /// Transition the image to a new layout with an immediate, blocking
    /// pipeline barrier
    ///
    /// The (current, new) pair must be in the supported table; anything else
    /// panics. Load-time path — per-frame barriers are recorded inline into
    /// the frame's command buffer instead.
    pub fn transition_layout(
        &mut self,
        ctx: &VulkanContext,
        new_layout: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let masks = transition_masks(self.current_layout, new_layout).unwrap_or_else(|| {
            panic!(
                "unsupported layout transition {:?} -> {:?}",
                self.current_layout, new_layout
            )
        });

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(self.current_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access)
            .build();

        let device = self.device.clone();
        ctx.immediate_submit(|cmd| unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                masks.src_stage,
                masks.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })?;

        // The barrier has been submitted and completed, the tracked layout
        // may now advance
        self.current_layout = new_layout;
        Ok(())
    }

    /// Create the 2D view for this image, once
    ///
    /// Subsequent calls are no-ops; the view lives as long as the image.
    pub fn add_image_view(&mut self, aspect_flags: vk::ImageAspectFlags) -> VulkanResult<()> {
        if self.view.is_some() {
            return Ok(());
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_flags,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe {
            self.device
                .create_image_view(&view_info, None)
                .map_err(VulkanError::Api)?
        };

        self.view = Some(view);
        Ok(())
    }

    /// Get the image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Get the image view, if one has been created
    pub fn view(&self) -> Option<vk::ImageView> {
        self.view
    }

    /// Get the image format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Get the layout the image was last transitioned to
    pub fn current_layout(&self) -> vk::ImageLayout {
        self.current_layout
    }

    /// Get the image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if let Some(view) = self.view.take() {
                self.device.destroy_image_view(view, None);
            }
        }
        self.allocator.destroy_image(self.image, &mut self.allocation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_to_transfer_dst_masks() {
        let masks = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn transfer_dst_to_shader_read_masks() {
        let masks = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        assert!(transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .is_none());
        assert!(transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )
        .is_none());
        assert!(transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .is_none());
    }
}
